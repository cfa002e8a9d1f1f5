#![deny(unused)]
//! Apa Execution Core - Agentic Process Automation
//!
//! A thin CLI/demo binary wiring the execution core's subsystems together
//! and driving one agent run to completion. REST is out of scope; this is
//! the request boundary described in spec.md §6.

use std::sync::Arc;

use apa_context::qdrant_store::{QdrantVectorStore, ZeroEmbeddingBackend};
use apa_context::vector::{SimpleVectorStore, VectorStore};
use apa_context::ContextManager;
use apa_core::config::AppConfig;
use apa_core::mem::{
    InMemoryAgentStore, InMemoryExecutionStore, InMemoryHitlStore, InMemoryLearningFeedbackStore,
    InMemoryMemoryRepository, InMemoryTraceStore,
};
use apa_core::traits::HitlStore;
use apa_core::types::{Agent, Task};
use apa_executor::ApaExecutionCore;
use apa_reasoning::providers::ProviderRegistry;
use apa_reasoning::rig_providers::{AnthropicProvider, OpenAiProvider};
use apa_safety::{AutoRejectDiagnosticGate, BlockingApprovalGate, SafetyEngine};
use apa_tools::builtin::{
    CalculateTool, DatabaseQueryTool, EchoTool, FileOperationTool, HttpRequestTool, SearchTool,
    SendEmailTool,
};
use apa_tools::registry::{DefaultToolRegistry, ToolRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let app_config = AppConfig::load().unwrap_or_default();

    apa_core::telemetry::configure_tracing(
        rust_log.as_deref(),
        app_config.observability.otel_endpoint.as_deref(),
        app_config.observability.json_logs,
    )?;

    tracing::info!("starting apa-execution-core v{}", env!("CARGO_PKG_VERSION"));

    // =========================================================================
    // Tool Registry
    // =========================================================================
    let tools = DefaultToolRegistry::new();
    tools.register(Arc::new(EchoTool)).await?;
    tools.register(Arc::new(CalculateTool)).await?;
    tools.register(Arc::new(SearchTool)).await?;
    tools.register(Arc::new(HttpRequestTool)).await?;
    tools.register(Arc::new(SendEmailTool)).await?;
    tools.register(Arc::new(FileOperationTool)).await?;
    tools.register(Arc::new(DatabaseQueryTool)).await?;
    let tool_registry: Arc<dyn ToolRegistry> = Arc::new(tools);

    // =========================================================================
    // Vector Store (context retrieval)
    // =========================================================================
    let vector_store: Arc<dyn VectorStore> = match app_config.context.vector_backend.as_str() {
        "managed" => {
            let url = app_config
                .context
                .qdrant_url
                .as_deref()
                .unwrap_or("http://localhost:6334");
            tracing::info!(url, collection = %app_config.context.qdrant_collection, "connecting to Qdrant");
            Arc::new(
                QdrantVectorStore::new(
                    url,
                    &app_config.context.qdrant_collection,
                    app_config.context.embedding_dim,
                    Box::new(ZeroEmbeddingBackend),
                )
                .await?,
            )
        }
        _ => {
            tracing::info!("using in-process vector store");
            Arc::new(SimpleVectorStore::new(app_config.context.embedding_dim))
        }
    };

    let memory_repo = Arc::new(InMemoryMemoryRepository::new());
    let context_manager = Arc::new(ContextManager::new(
        vector_store,
        memory_repo.clone(),
        app_config.context.top_k,
    ));

    // =========================================================================
    // Reasoning providers
    // =========================================================================
    let providers = ProviderRegistry::new();
    for (name, provider_cfg) in &app_config.reasoning.providers {
        if !provider_cfg.enabled {
            continue;
        }
        match name.as_str() {
            "openai" if std::env::var("MODEL_PROVIDER_API_KEY_OPENAI").is_ok() || std::env::var("OPENAI_API_KEY").is_ok() => {
                providers.register(Arc::new(OpenAiProvider));
                tracing::info!("registered OpenAI provider");
            }
            "anthropic" if std::env::var("MODEL_PROVIDER_API_KEY_ANTHROPIC").is_ok() || std::env::var("ANTHROPIC_API_KEY").is_ok() => {
                providers.register(Arc::new(AnthropicProvider));
                tracing::info!("registered Anthropic provider");
            }
            "openai" | "anthropic" => {
                tracing::warn!(provider = %name, "no API key configured, skipping");
            }
            other => tracing::warn!(provider = %other, "unrecognized provider in configuration"),
        }
    }
    let providers = Arc::new(providers);

    // =========================================================================
    // Safety Engine / HITL
    // =========================================================================
    let hitl_store: Arc<dyn HitlStore> = Arc::new(InMemoryHitlStore::new());
    let approval_timeout = std::time::Duration::from_secs(app_config.safety.approval_timeout_seconds);
    let safety_engine = Arc::new(match app_config.safety.hitl_mode.as_str() {
        "blocking" => SafetyEngine::new(
            Arc::new(BlockingApprovalGate::new(hitl_store.clone(), approval_timeout)),
            hitl_store.clone(),
        ),
        _ => SafetyEngine::new(
            Arc::new(AutoRejectDiagnosticGate::new(hitl_store.clone())),
            hitl_store.clone(),
        ),
    });

    // =========================================================================
    // Agent registry (demo agent; a real deployment loads these externally)
    // =========================================================================
    let agent_store = Arc::new(InMemoryAgentStore::new());
    agent_store.insert(Agent {
        id: "demo-agent".into(),
        name: "Demo Agent".into(),
        model: "gpt-4o-mini".into(),
        provider: app_config.reasoning.default_provider.clone(),
        temperature: 2,
        max_tokens: app_config.reasoning.default_max_tokens,
        tools: vec!["echo".into(), "calculate".into()],
        system_prompt: None,
        max_iterations: app_config.executor.default_max_iterations,
        enable_memory: true,
        enable_tools: true,
        enable_learning: true,
        enable_collaboration: false,
        safety_guardrails: None,
        metadata: serde_json::json!({}),
    });

    let core = ApaExecutionCore::new(
        agent_store,
        context_manager,
        tool_registry,
        providers,
        safety_engine,
        Arc::new(InMemoryTraceStore::new()),
        Arc::new(InMemoryExecutionStore::new()),
        memory_repo,
        hitl_store,
        Arc::new(InMemoryLearningFeedbackStore::new()),
        app_config.reasoning.allow_mock_fallback,
    );

    // =========================================================================
    // Drive one demo run
    // =========================================================================
    let task_description = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Summarize the benefits of agentic process automation".into());

    println!();
    println!("apa-execution-core v{}", env!("CARGO_PKG_VERSION"));
    println!("running demo-agent on: {task_description}");
    println!();

    let result = core
        .run("demo-agent", Task::new(task_description), None, None)
        .await?;

    println!("status:     {:?}", result.status);
    println!("iterations: {}", result.iterations);
    if let Some(value) = &result.result {
        println!("result:     {value}");
    }
    if let Some(reason) = &result.reason {
        println!("reason:     {reason}");
    }
    if let Some(error) = &result.error {
        println!("error:      {error}");
    }

    Ok(())
}
