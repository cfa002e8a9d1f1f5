//! Ties prompt assembly, provider dispatch, and response parsing into the
//! single `reason()` entry point the executor calls once per loop iteration.

use std::time::Instant;

use apa_core::types::{Action, Agent, Observation, ReasoningOutput, RunContext, Task};

use crate::parser::parse_response;
use crate::prompt::build_prompt;
use crate::providers::ProviderRegistry;

/// Fixed mock response returned when the provider is unconfigured, its
/// circuit is open, or the call itself errors. Grounded in
/// `original_source/.../reasoning_engine.py`'s `_mock_llm_call`, wording
/// matched to spec.md §4.2's closing paragraph. Treated by the executor as
/// normal termination, not a failure.
fn mock_response(latency_ms: u64) -> ReasoningOutput {
    ReasoningOutput {
        reasoning: "Analyzing the task…".to_string(),
        action: Action {
            r#type: "finish".to_string(),
            description: Some("Task completed successfully".to_string()),
            parameters: serde_json::Value::Object(Default::default()),
            result: Some(serde_json::json!({"status": "success", "message": "Mock completion"})),
        },
        reflection: Some("Successfully completed the task".to_string()),
        tokens_used: 150,
        latency_ms,
    }
}

/// `reason(agent, task, context, prior_actions, prior_observations) ->
/// ReasoningOutput`, exactly spec.md §4.2's public contract.
///
/// `allow_mock_fallback` gates whether an unconfigured/erroring provider
/// yields the mock response or propagates the provider error (spec.md's
/// closing sentence: "Implementations may disable the mock in production
/// builds via a configuration flag").
pub async fn reason(
    providers: &ProviderRegistry,
    agent: &Agent,
    task: &Task,
    context: &RunContext,
    prior_actions: &[Action],
    prior_observations: &[Observation],
    allow_mock_fallback: bool,
) -> apa_core::error::Result<ReasoningOutput> {
    let prompt = build_prompt(agent, task, context, prior_actions, prior_observations);

    let provider_id = if agent.provider.is_empty() {
        "mock".to_string()
    } else {
        agent.provider.to_ascii_lowercase()
    };
    let model = agent.model.as_str();
    let temperature = agent.temperature_fraction();
    let max_tokens = if agent.max_tokens == 0 { 2000 } else { agent.max_tokens };

    let start = Instant::now();
    let call_result = providers
        .call(&provider_id, &prompt, model, temperature, max_tokens)
        .await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match call_result {
        Ok(completion) => {
            let parsed = parse_response(&completion.text);
            Ok(ReasoningOutput {
                reasoning: parsed.reasoning,
                action: parsed.action,
                reflection: parsed.reflection,
                tokens_used: completion.total_tokens(),
                latency_ms,
            })
        }
        Err(err) => {
            if allow_mock_fallback {
                tracing::warn!(provider = %provider_id, error = %err, "provider call failed, falling back to mock response");
                Ok(mock_response(latency_ms))
            } else {
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{FailingProvider, ScriptedProvider};
    use apa_core::types::RelevantMemory;
    use serde_json::json;
    use std::sync::Arc;

    fn agent(provider: &str) -> Agent {
        Agent {
            id: "a1".into(),
            name: "tester".into(),
            model: "gpt-4o".into(),
            provider: provider.into(),
            temperature: 5,
            max_tokens: 2000,
            tools: vec![],
            system_prompt: None,
            max_iterations: 10,
            enable_memory: false,
            enable_tools: true,
            enable_learning: false,
            enable_collaboration: false,
            safety_guardrails: None,
            metadata: json!({}),
        }
    }

    fn empty_context(agent_id: &str) -> RunContext {
        RunContext::new(agent_id, "exec1", "task", Vec::<RelevantMemory>::new())
    }

    #[tokio::test]
    async fn parses_a_scripted_tool_call() {
        let registry = ProviderRegistry::new();
        registry.register(Arc::new(ScriptedProvider::new(
            "scripted",
            "Thought: I should calculate\nAction: calculate\nAction Input: {\"expression\": \"2+2\"}",
        )));
        let agent = agent("scripted");
        let ctx = empty_context(&agent.id);
        let task = Task::new("add numbers");

        let out = reason(&registry, &agent, &task, &ctx, &[], &[], true).await.unwrap();
        assert_eq!(out.action.r#type, "calculate");
        assert_eq!(out.tokens_used, 60);
    }

    #[tokio::test]
    async fn falls_back_to_mock_on_provider_failure() {
        let registry = ProviderRegistry::new();
        registry.register(Arc::new(FailingProvider::new("broken")));
        let agent = agent("broken");
        let ctx = empty_context(&agent.id);
        let task = Task::new("anything");

        let out = reason(&registry, &agent, &task, &ctx, &[], &[], true).await.unwrap();
        assert!(out.action.is_finish());
        assert_eq!(out.tokens_used, 150);
    }

    #[tokio::test]
    async fn propagates_error_when_mock_fallback_disabled() {
        let registry = ProviderRegistry::new();
        registry.register(Arc::new(FailingProvider::new("broken")));
        let agent = agent("broken");
        let ctx = empty_context(&agent.id);
        let task = Task::new("anything");

        let err = reason(&registry, &agent, &task, &ctx, &[], &[], false)
            .await
            .unwrap_err();
        assert!(matches!(err, apa_core::Error::Provider(_)));
    }

    #[tokio::test]
    async fn unconfigured_provider_falls_back_to_mock() {
        let registry = ProviderRegistry::new();
        let agent = agent("nonexistent");
        let ctx = empty_context(&agent.id);
        let task = Task::new("anything");

        let out = reason(&registry, &agent, &task, &ctx, &[], &[], true).await.unwrap();
        assert!(out.action.is_finish());
    }
}
