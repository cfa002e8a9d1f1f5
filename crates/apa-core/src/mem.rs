//! In-memory implementations of the relational store traits.
//!
//! Used by every subsystem's test suite, and usable as-is for a single-node
//! deployment that doesn't need a real database behind it.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;
use crate::traits::{
    AgentStore, ExecutionStore, HitlStats, HitlStore, LearningFeedbackStore, MemoryRepository,
    TraceStore,
};
use crate::types::{
    Agent, Execution, HitlRequest, LearningFeedback, MemoryItem, MemoryType, ReasoningTrace,
    RiskLevel,
};

#[derive(Default)]
pub struct InMemoryAgentStore {
    agents: DashMap<String, Agent>,
}

impl InMemoryAgentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, agent: Agent) {
        self.agents.insert(agent.id.clone(), agent);
    }
}

#[async_trait]
impl AgentStore for InMemoryAgentStore {
    async fn get(&self, agent_id: &str) -> Result<Option<Agent>> {
        Ok(self.agents.get(agent_id).map(|e| e.value().clone()))
    }
}

#[derive(Default)]
pub struct InMemoryExecutionStore {
    executions: DashMap<String, Execution>,
    cancelled: DashMap<String, bool>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self, execution_id: &str) {
        self.cancelled.insert(execution_id.to_string(), true);
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn create(&self, execution: Execution) -> Result<()> {
        self.executions.insert(execution.id.clone(), execution);
        Ok(())
    }

    async fn get(&self, execution_id: &str) -> Result<Option<Execution>> {
        Ok(self.executions.get(execution_id).map(|e| e.value().clone()))
    }

    async fn update(&self, execution: Execution) -> Result<()> {
        self.executions.insert(execution.id.clone(), execution);
        Ok(())
    }

    async fn is_cancelled(&self, execution_id: &str) -> Result<bool> {
        Ok(self.cancelled.get(execution_id).map(|v| *v).unwrap_or(false))
    }
}

#[derive(Default)]
pub struct InMemoryTraceStore {
    traces: DashMap<String, Vec<ReasoningTrace>>,
}

impl InMemoryTraceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TraceStore for InMemoryTraceStore {
    async fn save_trace(&self, trace: ReasoningTrace) -> Result<()> {
        let mut entry = self.traces.entry(trace.run_id.clone()).or_default();
        if entry.iter().any(|t| t.step_index == trace.step_index) {
            return Err(crate::Error::persistence(format!(
                "duplicate step_index {} for run {}",
                trace.step_index, trace.run_id
            )));
        }
        entry.push(trace);
        Ok(())
    }

    async fn traces_for(
        &self,
        agent_id: &str,
        run_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ReasoningTrace>> {
        let mut out: Vec<ReasoningTrace> = self
            .traces
            .iter()
            .flat_map(|e| e.value().clone())
            .filter(|t| t.agent_id == agent_id)
            .filter(|t| run_id.map_or(true, |r| t.run_id == r))
            .collect();
        out.sort_by_key(|t| (t.run_id.clone(), t.step_index));
        out.truncate(limit);
        Ok(out)
    }
}

#[derive(Default)]
pub struct InMemoryMemoryRepository {
    items: DashMap<String, MemoryItem>,
}

impl InMemoryMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryRepository for InMemoryMemoryRepository {
    async fn save(&self, item: MemoryItem) -> Result<()> {
        self.items.insert(item.id.clone(), item);
        Ok(())
    }

    async fn get(&self, memory_id: &str) -> Result<Option<MemoryItem>> {
        Ok(self.items.get(memory_id).map(|e| e.value().clone()))
    }

    async fn delete(&self, memory_id: &str) -> Result<()> {
        self.items.remove(memory_id);
        Ok(())
    }

    async fn record_access(&self, memory_id: &str) -> Result<()> {
        if let Some(mut item) = self.items.get_mut(memory_id) {
            item.access_count += 1;
            item.last_accessed_at = Some(chrono::Utc::now());
        }
        Ok(())
    }

    async fn most_recent(
        &self,
        agent_id: &str,
        memory_type: Option<MemoryType>,
        limit: usize,
    ) -> Result<Vec<MemoryItem>> {
        let mut items: Vec<MemoryItem> = self
            .items
            .iter()
            .map(|e| e.value().clone())
            .filter(|m| m.agent_id == agent_id)
            .filter(|m| memory_type.map_or(true, |t| m.memory_type == t))
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items.truncate(limit);
        Ok(items)
    }
}

#[derive(Default)]
pub struct InMemoryHitlStore {
    requests: DashMap<String, HitlRequest>,
}

impl InMemoryHitlStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HitlStore for InMemoryHitlStore {
    async fn create(&self, request: HitlRequest) -> Result<()> {
        self.requests.insert(request.id.clone(), request);
        Ok(())
    }

    async fn get(&self, request_id: &str) -> Result<Option<HitlRequest>> {
        Ok(self.requests.get(request_id).map(|e| e.value().clone()))
    }

    async fn update(&self, request: HitlRequest) -> Result<()> {
        self.requests.insert(request.id.clone(), request);
        Ok(())
    }

    async fn pending(
        &self,
        limit: usize,
        risk_level: Option<RiskLevel>,
    ) -> Result<Vec<HitlRequest>> {
        let mut out: Vec<HitlRequest> = self
            .requests
            .iter()
            .map(|e| e.value().clone())
            .filter(|r| r.is_pending())
            .filter(|r| risk_level.map_or(true, |rl| r.risk_level == rl))
            .collect();
        out.sort_by_key(|r| r.requested_at);
        out.truncate(limit);
        Ok(out)
    }

    async fn stats(&self) -> Result<HitlStats> {
        let mut stats = HitlStats::default();
        for entry in self.requests.iter() {
            stats.record(entry.value().status);
        }
        Ok(stats)
    }
}

#[derive(Default)]
pub struct InMemoryLearningFeedbackStore {
    feedback: DashMap<String, Vec<LearningFeedback>>,
}

impl InMemoryLearningFeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LearningFeedbackStore for InMemoryLearningFeedbackStore {
    async fn save(&self, feedback: LearningFeedback) -> Result<()> {
        self.feedback
            .entry(feedback.agent_id.clone())
            .or_default()
            .push(feedback);
        Ok(())
    }

    async fn for_agent(&self, agent_id: &str, limit: usize) -> Result<Vec<LearningFeedback>> {
        let mut out = self
            .feedback
            .get(agent_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        out.truncate(limit);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn trace_store_rejects_duplicate_step_index() {
        let store = InMemoryTraceStore::new();
        let trace = ReasoningTrace::new(
            "t1",
            "run1",
            "agent1",
            0,
            "thinking",
            crate::types::Action::new("calculation", json!({})),
            crate::types::Observation::success(json!({"result": 4})),
            None,
            10,
            5,
        );
        store.save_trace(trace.clone()).await.unwrap();
        let err = store.save_trace(trace).await.unwrap_err();
        assert!(matches!(err, crate::Error::Persistence(_)));
    }

    #[tokio::test]
    async fn hitl_store_tracks_pending() {
        use crate::types::{HitlRequestType, HitlStatus};
        let store = InMemoryHitlStore::new();
        let req = HitlRequest {
            id: "h1".into(),
            run_id: "run1".into(),
            agent_id: "agent1".into(),
            request_type: HitlRequestType::ActionApproval,
            reason: "high risk".into(),
            action_details: crate::types::Action::new("user_communication", json!({})),
            risk_level: RiskLevel::High,
            status: HitlStatus::Pending,
            decision: None,
            feedback: None,
            reason_code: None,
            requested_at: chrono::Utc::now(),
            responded_at: None,
            responded_by: None,
        };
        store.create(req).await.unwrap();
        let pending = store.pending(10, None).await.unwrap();
        assert_eq!(pending.len(), 1);
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.pending, 1);
    }
}
