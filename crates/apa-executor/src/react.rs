//! The ReAct control loop: `INIT → REASON → VALIDATE → (AWAIT_APPROVAL)? →
//! ACT → OBSERVE → PERSIST → UPDATE → {REASON | TERMINAL}`, exactly as
//! spec.md §4.1 describes. Grounded in
//! `original_source/.../agent_executor.py`'s `execute_task`/`_execute_action`
//! /`_store_trace`/`_store_learning_feedback`, translated into typed Rust
//! control flow: reasoning/tool errors are caught and folded into a
//! terminal `error` outcome (never propagated), while persistence failures
//! propagate as `Err` after the run's status is already set to `error`,
//! per §7.

use std::sync::Arc;

use uuid::Uuid;

use apa_context::ContextManager;
use apa_core::error::{Error, Result};
use apa_core::traits::{ExecutionStore, LearningFeedbackStore, TraceStore};
use apa_core::types::{
    Action, Agent, Execution, ExecutionResult, ExecutionResultStatus, ExecutionStatus,
    HitlDecision, HitlStatus, LearningFeedback, MemoryType, Observation, Outcome, ReasoningTrace,
    ReasoningOutput, Task,
};
use apa_reasoning::ProviderRegistry;
use apa_safety::SafetyEngine;
use apa_tools::registry::ToolRegistry;

/// Drives one `(agent, execution, task)` to a terminal state. Holds no
/// per-run state itself; every collaborator is `Arc`-shared and injected at
/// construction, never a module-level singleton (§1.1).
pub struct Executor {
    context_manager: Arc<ContextManager>,
    tool_registry: Arc<dyn ToolRegistry>,
    providers: Arc<ProviderRegistry>,
    safety_engine: Arc<SafetyEngine>,
    trace_store: Arc<dyn TraceStore>,
    execution_store: Arc<dyn ExecutionStore>,
    feedback_store: Arc<dyn LearningFeedbackStore>,
    allow_mock_fallback: bool,
}

impl Executor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context_manager: Arc<ContextManager>,
        tool_registry: Arc<dyn ToolRegistry>,
        providers: Arc<ProviderRegistry>,
        safety_engine: Arc<SafetyEngine>,
        trace_store: Arc<dyn TraceStore>,
        execution_store: Arc<dyn ExecutionStore>,
        feedback_store: Arc<dyn LearningFeedbackStore>,
        allow_mock_fallback: bool,
    ) -> Self {
        Self {
            context_manager,
            tool_registry,
            providers,
            safety_engine,
            trace_store,
            execution_store,
            feedback_store,
            allow_mock_fallback,
        }
    }

    /// `execute_task(agent, execution, task, max_iterations?) ->
    /// ExecutionResult`, spec.md §4.1's public contract. The caller is
    /// responsible for holding the per-run advisory lock for the duration of
    /// this call (see `crate::lock::RunLock`).
    #[tracing::instrument(skip_all, fields(agent_id = %agent.id, execution_id = %execution.id))]
    pub async fn execute_task(
        &self,
        agent: &Agent,
        mut execution: Execution,
        task: Task,
        max_iterations: Option<usize>,
    ) -> Result<ExecutionResult> {
        let max_iterations = max_iterations.unwrap_or(agent.max_iterations);

        execution.status = ExecutionStatus::Running;
        self.execution_store.update(execution.clone()).await?;

        let mut context = self
            .context_manager
            .load_context(&agent.id, &execution.id, &task.description)
            .await?;

        let mut actions: Vec<Action> = Vec::new();
        let mut observations: Vec<Observation> = Vec::new();

        let mut status = ExecutionResultStatus::Completed;
        let mut result: Option<serde_json::Value> = None;
        let mut reason: Option<String> = None;
        let mut error: Option<String> = None;
        let mut iterations = 0usize;
        let mut finished = false;

        for step_index in 0..max_iterations {
            iterations = step_index;

            if self.execution_store.is_cancelled(&execution.id).await? {
                let trace = ReasoningTrace::new(
                    Uuid::new_v4().to_string(),
                    execution.id.clone(),
                    agent.id.clone(),
                    step_index as u32,
                    "execution cancelled",
                    actions
                        .last()
                        .cloned()
                        .unwrap_or_else(|| Action::new("cancel", serde_json::json!({}))),
                    Observation::success(serde_json::json!({"cancelled": true})),
                    None,
                    0,
                    0,
                );
                self.trace_store.save_trace(trace).await?;
                status = ExecutionResultStatus::Cancelled;
                reason = Some("execution cancelled".to_string());
                finished = true;
                break;
            }

            let thought: ReasoningOutput = match apa_reasoning::reason(
                &self.providers,
                agent,
                &task,
                &context,
                &actions,
                &observations,
                self.allow_mock_fallback,
            )
            .await
            {
                Ok(output) => output,
                Err(err) => {
                    self.persist_error_trace(&agent.id, &execution.id, step_index, actions.last().cloned(), &err)
                        .await?;
                    self.persist_failure_feedback(agent, &execution.id, &task, actions.last().cloned(), &err)
                        .await?;
                    status = ExecutionResultStatus::Error;
                    error = Some(err.to_string());
                    finished = true;
                    break;
                }
            };

            let action = thought.action.clone();

            if action.is_finish() {
                result = action.result.clone();
                let trace = ReasoningTrace::new(
                    Uuid::new_v4().to_string(),
                    execution.id.clone(),
                    agent.id.clone(),
                    step_index as u32,
                    thought.reasoning.clone(),
                    action.clone(),
                    Observation::success(serde_json::json!({"message": "Task completed"})),
                    thought.reflection.clone(),
                    thought.tokens_used,
                    thought.latency_ms,
                );
                self.trace_store.save_trace(trace).await?;
                status = ExecutionResultStatus::Completed;
                finished = true;
                break;
            }

            let validation = self
                .safety_engine
                .validate_action(&action, agent.safety_guardrails.as_ref(), &context);

            if !validation.allowed {
                if validation.requires_human_approval {
                    let hitl = self
                        .safety_engine
                        .request_human_approval(
                            &execution.id,
                            &agent.id,
                            &action,
                            validation.reason.as_deref().unwrap_or("High-risk action"),
                            validation.risk_level,
                        )
                        .await?;

                    if hitl.status != HitlStatus::Approved {
                        status = ExecutionResultStatus::Blocked;
                        reason = validation.reason;
                        finished = true;
                        break;
                    }
                } else {
                    status = ExecutionResultStatus::Blocked;
                    reason = validation.reason;
                    finished = true;
                    break;
                }
            }

            let outcome = match self
                .tool_registry
                .execute_tool(&action.r#type, action.parameters.clone(), Some(&agent.id))
                .await
            {
                Ok(outcome) => outcome,
                Err(err) => {
                    self.persist_error_trace(&agent.id, &execution.id, step_index, Some(action.clone()), &err)
                        .await?;
                    self.persist_failure_feedback(agent, &execution.id, &task, Some(action.clone()), &err)
                        .await?;
                    status = ExecutionResultStatus::Error;
                    error = Some(err.to_string());
                    finished = true;
                    break;
                }
            };

            let observation = if outcome.status == "success" {
                Observation::success(outcome.result.clone().unwrap_or(serde_json::Value::Null))
            } else {
                Observation::error(outcome.error.clone().unwrap_or_else(|| "tool execution failed".to_string()))
            };

            let trace = ReasoningTrace::new(
                Uuid::new_v4().to_string(),
                execution.id.clone(),
                agent.id.clone(),
                step_index as u32,
                thought.reasoning.clone(),
                action.clone(),
                observation.clone(),
                thought.reflection.clone(),
                thought.tokens_used,
                thought.latency_ms,
            );
            self.trace_store.save_trace(trace).await?;

            self.context_manager.update_context(&mut context, action.clone(), observation.clone());

            if agent.enable_memory {
                let content = format!("Action: {} - Result: {}", action.r#type, observation.status);
                let metadata = serde_json::json!({
                    "action": action,
                    "observation": observation,
                    "task_id": task.id,
                });
                if let Err(err) = self
                    .context_manager
                    .store_memory(&agent.id, &content, MemoryType::Episodic, metadata, None)
                    .await
                {
                    tracing::warn!(error = %err, "failed to persist episodic memory for step");
                }
            }

            actions.push(action);
            observations.push(observation);
        }

        if !finished {
            status = ExecutionResultStatus::Timeout;
            reason = Some(format!("Maximum iterations ({max_iterations}) exceeded"));
            iterations = max_iterations;
        }

        if status == ExecutionResultStatus::Completed && agent.enable_learning {
            let feedback = LearningFeedback {
                id: Uuid::new_v4().to_string(),
                agent_id: agent.id.clone(),
                run_id: Some(execution.id.clone()),
                trace_id: None,
                feedback_type: "execution_outcome".to_string(),
                task_description: task.description.clone(),
                action_taken: actions
                    .last()
                    .cloned()
                    .unwrap_or_else(|| Action::finish(serde_json::json!({}))),
                outcome: Outcome::Success,
                success: true,
                error_message: None,
                improvement_suggestions: None,
                created_at: chrono::Utc::now(),
            };
            self.feedback_store.save(feedback).await?;
        }

        execution.status = match status {
            ExecutionResultStatus::Completed => ExecutionStatus::Completed,
            ExecutionResultStatus::Blocked => ExecutionStatus::Failed,
            ExecutionResultStatus::Timeout => ExecutionStatus::Timeout,
            ExecutionResultStatus::Error => ExecutionStatus::Failed,
            ExecutionResultStatus::Cancelled => ExecutionStatus::Cancelled,
        };
        execution.output = result.clone();
        execution.error = error.clone();
        execution.completed_at = Some(chrono::Utc::now());
        self.execution_store.update(execution).await?;

        Ok(ExecutionResult {
            status,
            result,
            iterations,
            actions_taken: actions.len(),
            reason,
            error,
        })
    }

    async fn persist_error_trace(
        &self,
        agent_id: &str,
        run_id: &str,
        step_index: usize,
        action: Option<Action>,
        err: &Error,
    ) -> Result<()> {
        let trace = ReasoningTrace::new(
            Uuid::new_v4().to_string(),
            run_id.to_string(),
            agent_id.to_string(),
            step_index as u32,
            "Error occurred during execution",
            action.unwrap_or_else(|| Action::new("unknown", serde_json::json!({}))),
            Observation::error(err.to_string()),
            Some("Execution failed".to_string()),
            0,
            0,
        );
        self.trace_store.save_trace(trace).await
    }

    async fn persist_failure_feedback(
        &self,
        agent: &Agent,
        run_id: &str,
        task: &Task,
        action: Option<Action>,
        err: &Error,
    ) -> Result<()> {
        if !agent.enable_learning {
            return Ok(());
        }
        let feedback = LearningFeedback {
            id: Uuid::new_v4().to_string(),
            agent_id: agent.id.clone(),
            run_id: Some(run_id.to_string()),
            trace_id: None,
            feedback_type: "execution_outcome".to_string(),
            task_description: task.description.clone(),
            action_taken: action.unwrap_or_else(|| Action::new("unknown", serde_json::json!({}))),
            outcome: Outcome::Failure,
            success: false,
            error_message: Some(err.to_string()),
            improvement_suggestions: None,
            created_at: chrono::Utc::now(),
        };
        self.feedback_store.save(feedback).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apa_context::vector::SimpleVectorStore;
    use apa_core::mem::{
        InMemoryExecutionStore, InMemoryHitlStore, InMemoryLearningFeedbackStore, InMemoryMemoryRepository,
        InMemoryTraceStore,
    };
    use apa_core::traits::HitlStore;
    use apa_reasoning::providers::{FailingProvider, ScriptedProvider};
    use apa_safety::{AutoRejectDiagnosticGate, SafetyEngine};
    use apa_tools::builtin::{CalculateTool, EchoTool};
    use apa_tools::registry::DefaultToolRegistry;
    use serde_json::json;

    fn agent(provider: &str, enable_memory: bool, enable_learning: bool) -> Agent {
        Agent {
            id: "agent-1".into(),
            name: "tester".into(),
            model: "gpt-4o".into(),
            provider: provider.into(),
            temperature: 5,
            max_tokens: 2000,
            tools: vec![],
            system_prompt: None,
            max_iterations: 5,
            enable_memory,
            enable_tools: true,
            enable_learning,
            enable_collaboration: false,
            safety_guardrails: None,
            metadata: json!({}),
        }
    }

    async fn build_executor(providers: ProviderRegistry, allow_mock_fallback: bool) -> (Executor, Arc<InMemoryTraceStore>) {
        let registry = DefaultToolRegistry::new();
        registry.register(Arc::new(EchoTool)).await.unwrap();
        registry.register(Arc::new(CalculateTool)).await.unwrap();
        let tool_registry: Arc<dyn ToolRegistry> = Arc::new(registry);

        let hitl_store: Arc<dyn HitlStore> = Arc::new(InMemoryHitlStore::new());
        let safety_engine = Arc::new(SafetyEngine::new(
            Arc::new(AutoRejectDiagnosticGate::new(hitl_store.clone())),
            hitl_store,
        ));
        let trace_store = Arc::new(InMemoryTraceStore::new());

        let executor = Executor::new(
            Arc::new(ContextManager::new(
                Arc::new(SimpleVectorStore::new(16)),
                Arc::new(InMemoryMemoryRepository::new()),
                5,
            )),
            tool_registry,
            Arc::new(providers),
            safety_engine,
            trace_store.clone(),
            Arc::new(InMemoryExecutionStore::new()),
            Arc::new(InMemoryLearningFeedbackStore::new()),
            allow_mock_fallback,
        );

        (executor, trace_store)
    }

    #[tokio::test]
    async fn immediate_finish_completes_at_zero_iterations() {
        let providers = ProviderRegistry::new();
        providers.register(Arc::new(ScriptedProvider::new(
            "scripted",
            "Thought: done\nAction: finish\nResult: {\"answer\": 42}",
        )));
        let (executor, _traces) = build_executor(providers, true).await;

        let agent = agent("scripted", false, false);
        let execution = Execution::new("run-1", &agent.id, json!({}));
        let task = Task::new("answer the question");

        let result = executor.execute_task(&agent, execution, task, None).await.unwrap();
        assert_eq!(result.status, ExecutionResultStatus::Completed);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.result.unwrap()["answer"], 42);
    }

    #[tokio::test]
    async fn tool_assisted_finish_persists_a_trace_per_step() {
        let providers = ProviderRegistry::new();
        providers.register(Arc::new(ScriptedProvider::new(
            "scripted",
            "Thought: need to greet\nAction: echo\nAction Input: {\"message\": \"hi\"}",
        )));
        let (executor, traces) = build_executor(providers, true).await;
        let agent = agent("scripted", false, false);
        let execution = Execution::new("run-2", &agent.id, json!({}));
        let task = Task::new("say hi");

        let result = executor.execute_task(&agent, execution, task, Some(1)).await.unwrap();
        assert_eq!(result.status, ExecutionResultStatus::Timeout);
        let saved = traces.traces_for(&agent.id, Some("run-2"), 10).await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].action.r#type, "echo");
    }

    #[tokio::test]
    async fn tool_assisted_finish_reaches_completion_at_iteration_one() {
        let providers = ProviderRegistry::new();
        providers.register(Arc::new(ScriptedProvider::sequence(
            "scripted",
            vec![
                "Thought: need to calculate\nAction: calculate\nAction Input: {\"expression\": \"2+2*3\"}".to_string(),
                "Thought: got the answer\nAction: finish\nResult: {\"answer\": 8}".to_string(),
            ],
        )));
        let (executor, traces) = build_executor(providers, true).await;
        let agent = agent("scripted", false, false);
        let execution = Execution::new("run-2b", &agent.id, json!({}));
        let task = Task::new("2+2*3");

        let result = executor.execute_task(&agent, execution, task, None).await.unwrap();
        assert_eq!(result.status, ExecutionResultStatus::Completed);
        assert_eq!(result.iterations, 1);
        assert_eq!(result.result.unwrap()["answer"], 8);
        let saved = traces.traces_for(&agent.id, Some("run-2b"), 10).await.unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].step_index, 0);
        assert_eq!(saved[1].step_index, 1);
    }

    #[tokio::test]
    async fn blocked_high_risk_action_stops_the_loop() {
        let providers = ProviderRegistry::new();
        providers.register(Arc::new(ScriptedProvider::new(
            "scripted",
            "Thought: send it\nAction: user_communication\nAction Input: {\"to\": \"a@b.com\"}",
        )));
        let (executor, _traces) = build_executor(providers, true).await;
        let agent = agent("scripted", false, false);
        let execution = Execution::new("run-3", &agent.id, json!({}));
        let task = Task::new("notify the user");

        let result = executor.execute_task(&agent, execution, task, None).await.unwrap();
        assert_eq!(result.status, ExecutionResultStatus::Blocked);
    }

    #[tokio::test]
    async fn provider_failure_with_mock_disabled_yields_error_status() {
        let providers = ProviderRegistry::new();
        providers.register(Arc::new(FailingProvider::new("broken")));
        let (executor, _traces) = build_executor(providers, false).await;
        let agent = agent("broken", false, true);
        let execution = Execution::new("run-4", &agent.id, json!({}));
        let task = Task::new("anything");

        let result = executor.execute_task(&agent, execution, task, None).await.unwrap();
        assert_eq!(result.status, ExecutionResultStatus::Error);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn zero_max_iterations_times_out_without_a_single_trace() {
        let providers = ProviderRegistry::new();
        providers.register(Arc::new(ScriptedProvider::new(
            "scripted",
            "Thought: done\nAction: finish\nResult: {\"answer\": 1}",
        )));
        let (executor, traces) = build_executor(providers, true).await;
        let agent = agent("scripted", false, false);
        let execution = Execution::new("run-0", &agent.id, json!({}));
        let task = Task::new("never gets to run");

        let result = executor.execute_task(&agent, execution, task, Some(0)).await.unwrap();
        assert_eq!(result.status, ExecutionResultStatus::Timeout);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.actions_taken, 0);
        let saved = traces.traces_for(&agent.id, Some("run-0"), 10).await.unwrap();
        assert!(saved.is_empty());
    }

    #[tokio::test]
    async fn hitl_approval_lets_the_loop_reach_finish() {
        let providers = ProviderRegistry::new();
        providers.register(Arc::new(ScriptedProvider::sequence(
            "scripted",
            vec![
                "Thought: need sign-off\nAction: user_communication\nAction Input: {\"to\": \"a@b.com\"}".to_string(),
                "Thought: sent\nAction: finish\nResult: {\"sent\": true}".to_string(),
            ],
        )));

        let registry = DefaultToolRegistry::new();
        registry.register(Arc::new(EchoTool)).await.unwrap();
        let tool_registry: Arc<dyn ToolRegistry> = Arc::new(registry);

        let hitl_store: Arc<dyn HitlStore> = Arc::new(InMemoryHitlStore::new());
        let gate = Arc::new(apa_safety::BlockingApprovalGate::new(
            hitl_store.clone(),
            std::time::Duration::from_secs(5),
        ));
        let safety_engine = Arc::new(SafetyEngine::new(gate.clone(), hitl_store.clone()));
        let trace_store = Arc::new(InMemoryTraceStore::new());

        let executor = Executor::new(
            Arc::new(ContextManager::new(
                Arc::new(SimpleVectorStore::new(16)),
                Arc::new(InMemoryMemoryRepository::new()),
                5,
            )),
            tool_registry,
            Arc::new(providers),
            safety_engine,
            trace_store.clone(),
            Arc::new(InMemoryExecutionStore::new()),
            Arc::new(InMemoryLearningFeedbackStore::new()),
            true,
        );

        let agent = agent("scripted", false, false);
        let execution = Execution::new("run-6", &agent.id, json!({}));
        let task = Task::new("notify and finish");

        let run = tokio::spawn(async move { executor.execute_task(&agent, execution, task, None).await });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let pending_id = {
            let rows = hitl_store.pending(10, None).await.unwrap();
            rows[0].id.clone()
        };
        gate.respond(&pending_id, "operator-1", HitlDecision::Approve, None)
            .await
            .unwrap();

        let result = run.await.unwrap().unwrap();
        assert_eq!(result.status, ExecutionResultStatus::Completed);
        assert_eq!(result.result.unwrap()["sent"], true);
        let saved = trace_store.traces_for("agent-1", Some("run-6"), 10).await.unwrap();
        assert_eq!(saved.len(), 2);
    }

    #[tokio::test]
    async fn cancellation_is_observed_at_the_next_iteration_boundary() {
        let providers = ProviderRegistry::new();
        providers.register(Arc::new(ScriptedProvider::new(
            "scripted",
            "Thought: thinking\nAction: echo\nAction Input: {\"message\": \"loop\"}",
        )));

        let registry = DefaultToolRegistry::new();
        registry.register(Arc::new(EchoTool)).await.unwrap();
        let tool_registry: Arc<dyn ToolRegistry> = Arc::new(registry);
        let hitl_store: Arc<dyn HitlStore> = Arc::new(InMemoryHitlStore::new());
        let safety_engine = Arc::new(SafetyEngine::new(
            Arc::new(AutoRejectDiagnosticGate::new(hitl_store.clone())),
            hitl_store,
        ));
        let execution_store = Arc::new(InMemoryExecutionStore::new());
        let trace_store = Arc::new(InMemoryTraceStore::new());

        let executor = Executor::new(
            Arc::new(ContextManager::new(
                Arc::new(SimpleVectorStore::new(16)),
                Arc::new(InMemoryMemoryRepository::new()),
                5,
            )),
            tool_registry,
            Arc::new(providers),
            safety_engine,
            trace_store,
            execution_store.clone(),
            Arc::new(InMemoryLearningFeedbackStore::new()),
            true,
        );

        let agent = agent("scripted", false, false);
        let execution = Execution::new("run-7", &agent.id, json!({}));
        let task = Task::new("loop forever");

        execution_store.cancel("run-7");
        let result = executor.execute_task(&agent, execution, task, None).await.unwrap();
        assert_eq!(result.status, ExecutionResultStatus::Cancelled);
    }

    #[tokio::test]
    async fn budget_exhaustion_times_out_without_finishing() {
        let providers = ProviderRegistry::new();
        providers.register(Arc::new(ScriptedProvider::new(
            "scripted",
            "Thought: thinking\nAction: echo\nAction Input: {\"message\": \"loop\"}",
        )));
        let (executor, _traces) = build_executor(providers, true).await;
        let mut agent = agent("scripted", false, false);
        agent.max_iterations = 2;
        let execution = Execution::new("run-5", &agent.id, json!({}));
        let task = Task::new("loop forever");

        let result = executor.execute_task(&agent, execution, task, None).await.unwrap();
        assert_eq!(result.status, ExecutionResultStatus::Timeout);
        assert_eq!(result.iterations, 2);
    }
}
