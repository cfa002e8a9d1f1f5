//! `ApaExecutionCore`: the single request boundary spec.md §6 describes.
//! Wires the agent store, context manager, tool registry, reasoning
//! providers, and safety engine behind one `run` call plus the read-only
//! auxiliary queries a caller needs around it.

use std::sync::Arc;

use uuid::Uuid;

use apa_context::ContextManager;
use apa_core::error::{Error, Result};
use apa_core::traits::{
    AgentStore, ExecutionStore, HitlStats, HitlStore, LearningFeedbackStore, MemoryRepository,
    TraceStore,
};
use apa_core::types::{
    Execution, ExecutionResult, ExecutionResultStatus, HitlDecision, HitlRequest, MemoryItem,
    MemoryType, ReasoningTrace, RiskLevel, Task,
};
use apa_reasoning::ProviderRegistry;
use apa_safety::SafetyEngine;
use apa_tools::registry::ToolRegistry;

use crate::lock::RunLock;
use crate::react::Executor;

/// Everything a caller needs to drive agent executions and inspect their
/// aftermath, assembled once at startup and shared by `Arc`.
pub struct ApaExecutionCore {
    agent_store: Arc<dyn AgentStore>,
    execution_store: Arc<dyn ExecutionStore>,
    trace_store: Arc<dyn TraceStore>,
    memory_repo: Arc<dyn MemoryRepository>,
    hitl_store: Arc<dyn HitlStore>,
    safety_engine: Arc<SafetyEngine>,
    executor: Executor,
    run_lock: RunLock,
}

impl ApaExecutionCore {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent_store: Arc<dyn AgentStore>,
        context_manager: Arc<ContextManager>,
        tool_registry: Arc<dyn ToolRegistry>,
        providers: Arc<ProviderRegistry>,
        safety_engine: Arc<SafetyEngine>,
        trace_store: Arc<dyn TraceStore>,
        execution_store: Arc<dyn ExecutionStore>,
        memory_repo: Arc<dyn MemoryRepository>,
        hitl_store: Arc<dyn HitlStore>,
        feedback_store: Arc<dyn LearningFeedbackStore>,
        allow_mock_fallback: bool,
    ) -> Self {
        let executor = Executor::new(
            context_manager,
            tool_registry,
            providers,
            safety_engine.clone(),
            trace_store.clone(),
            execution_store.clone(),
            feedback_store,
            allow_mock_fallback,
        );

        Self {
            agent_store,
            execution_store,
            trace_store,
            memory_repo,
            hitl_store,
            safety_engine,
            executor,
            run_lock: RunLock::new(),
        }
    }

    /// Drives `agent_id` through `task` to a terminal `ExecutionResult`.
    /// `execution_id` is generated when omitted; re-entering an
    /// already-running id is a validation error (spec.md §5).
    pub async fn run(
        &self,
        agent_id: &str,
        task: Task,
        execution_id: Option<String>,
        max_iterations: Option<usize>,
    ) -> Result<ExecutionResult> {
        let agent = self
            .agent_store
            .get(agent_id)
            .await?
            .ok_or_else(|| Error::validation(format!("unknown agent '{agent_id}'")))?;

        let execution_id = execution_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let _guard = self.run_lock.acquire(&execution_id)?;

        let execution = match self.execution_store.get(&execution_id).await? {
            Some(existing) => existing,
            None => {
                let execution = Execution::new(execution_id.clone(), agent_id, task.parameters.clone());
                self.execution_store.create(execution.clone()).await?;
                execution
            }
        };

        if execution.is_terminal() {
            return Err(Error::validation(format!(
                "execution '{execution_id}' has already reached a terminal status"
            )));
        }

        self.executor
            .execute_task(&agent, execution, task, max_iterations)
            .await
    }

    pub async fn reasoning_traces_for(
        &self,
        agent_id: &str,
        run_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ReasoningTrace>> {
        self.trace_store.traces_for(agent_id, run_id, limit).await
    }

    pub async fn memory_for(
        &self,
        agent_id: &str,
        memory_type: Option<MemoryType>,
        limit: usize,
    ) -> Result<Vec<MemoryItem>> {
        self.memory_repo.most_recent(agent_id, memory_type, limit).await
    }

    pub async fn hitl_pending(&self, limit: usize, risk_level: Option<RiskLevel>) -> Result<Vec<HitlRequest>> {
        self.hitl_store.pending(limit, risk_level).await
    }

    pub async fn hitl_respond(
        &self,
        request_id: &str,
        user_id: &str,
        decision: HitlDecision,
        feedback: Option<String>,
    ) -> Result<HitlRequest> {
        self.safety_engine.respond(request_id, user_id, decision, feedback).await
    }

    pub async fn hitl_stats(&self) -> Result<HitlStats> {
        self.hitl_store.stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apa_context::vector::SimpleVectorStore;
    use apa_core::mem::{
        InMemoryAgentStore, InMemoryExecutionStore, InMemoryHitlStore, InMemoryLearningFeedbackStore,
        InMemoryMemoryRepository, InMemoryTraceStore,
    };
    use apa_core::types::Agent;
    use apa_reasoning::providers::ScriptedProvider;
    use apa_safety::AutoRejectDiagnosticGate;
    use apa_tools::registry::DefaultToolRegistry;
    use serde_json::json;

    fn agent(id: &str, provider: &str) -> Agent {
        Agent {
            id: id.to_string(),
            name: "tester".into(),
            model: "gpt-4o".into(),
            provider: provider.into(),
            temperature: 5,
            max_tokens: 2000,
            tools: vec![],
            system_prompt: None,
            max_iterations: 5,
            enable_memory: false,
            enable_tools: true,
            enable_learning: false,
            enable_collaboration: false,
            safety_guardrails: None,
            metadata: json!({}),
        }
    }

    fn core(agent_store: Arc<InMemoryAgentStore>) -> ApaExecutionCore {
        let providers = ProviderRegistry::new();
        providers.register(Arc::new(ScriptedProvider::new(
            "scripted",
            "Thought: done\nAction: finish\nResult: {\"ok\": true}",
        )));
        let hitl_store: Arc<dyn HitlStore> = Arc::new(InMemoryHitlStore::new());
        let safety_engine = Arc::new(SafetyEngine::new(
            Arc::new(AutoRejectDiagnosticGate::new(hitl_store.clone())),
            hitl_store.clone(),
        ));

        ApaExecutionCore::new(
            agent_store,
            Arc::new(ContextManager::new(
                Arc::new(SimpleVectorStore::new(16)),
                Arc::new(InMemoryMemoryRepository::new()),
                5,
            )),
            Arc::new(DefaultToolRegistry::new()),
            Arc::new(providers),
            safety_engine,
            Arc::new(InMemoryTraceStore::new()),
            Arc::new(InMemoryExecutionStore::new()),
            Arc::new(InMemoryMemoryRepository::new()),
            hitl_store,
            Arc::new(InMemoryLearningFeedbackStore::new()),
            true,
        )
    }

    #[tokio::test]
    async fn run_completes_a_registered_agent() {
        let agent_store = Arc::new(InMemoryAgentStore::new());
        agent_store.insert(agent("agent-1", "scripted"));
        let core = core(agent_store);

        let result = core
            .run("agent-1", Task::new("do a thing"), None, None)
            .await
            .unwrap();

        assert_eq!(result.status, ExecutionResultStatus::Completed);
    }

    #[tokio::test]
    async fn run_rejects_an_unknown_agent() {
        let agent_store = Arc::new(InMemoryAgentStore::new());
        let core = core(agent_store);

        let result = core.run("ghost", Task::new("do a thing"), None, None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn run_rejects_a_second_call_on_an_already_terminal_execution() {
        let agent_store = Arc::new(InMemoryAgentStore::new());
        agent_store.insert(agent("agent-1", "scripted"));
        let core = core(agent_store);

        let first = core
            .run("agent-1", Task::new("do a thing"), Some("run-fixed".into()), None)
            .await
            .unwrap();
        assert_eq!(first.status, ExecutionResultStatus::Completed);

        let second = core
            .run("agent-1", Task::new("do a thing"), Some("run-fixed".into()), None)
            .await;
        assert!(second.is_err());
    }
}
