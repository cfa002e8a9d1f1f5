use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    Agent, Execution, HitlRequest, HitlStatus, LearningFeedback, MemoryItem, MemoryType,
    ReasoningTrace, RiskLevel,
};

/// Read-only view onto externally-managed agent configuration. Agents are
/// created and administered outside the execution core; the core never
/// writes one.
#[async_trait]
pub trait AgentStore: Send + Sync {
    async fn get(&self, agent_id: &str) -> Result<Option<Agent>>;
}

/// The `executions` table. Mutated by the executor as a run progresses
/// through its state machine.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn create(&self, execution: Execution) -> Result<()>;
    async fn get(&self, execution_id: &str) -> Result<Option<Execution>>;
    async fn update(&self, execution: Execution) -> Result<()>;
    /// Cooperative cancellation signal checked at iteration boundaries.
    async fn is_cancelled(&self, execution_id: &str) -> Result<bool>;
}

/// The `reasoning_traces` table. Append-only; `(run_id, step_index)` is a
/// composite unique key.
#[async_trait]
pub trait TraceStore: Send + Sync {
    async fn save_trace(&self, trace: ReasoningTrace) -> Result<()>;
    async fn traces_for(
        &self,
        agent_id: &str,
        run_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ReasoningTrace>>;
}

/// The `memory_items` table: relational storage for memory records. The
/// vector index is a separate, non-transactional concern (see
/// `apa-context::vector::VectorStore`).
#[async_trait]
pub trait MemoryRepository: Send + Sync {
    async fn save(&self, item: MemoryItem) -> Result<()>;
    async fn get(&self, memory_id: &str) -> Result<Option<MemoryItem>>;
    async fn delete(&self, memory_id: &str) -> Result<()>;
    async fn record_access(&self, memory_id: &str) -> Result<()>;
    /// Most recent items for an agent, used as the recency fallback when the
    /// vector layer is unavailable.
    async fn most_recent(
        &self,
        agent_id: &str,
        memory_type: Option<MemoryType>,
        limit: usize,
    ) -> Result<Vec<MemoryItem>>;
}

/// The `hitl_requests` table.
#[async_trait]
pub trait HitlStore: Send + Sync {
    async fn create(&self, request: HitlRequest) -> Result<()>;
    async fn get(&self, request_id: &str) -> Result<Option<HitlRequest>>;
    async fn update(&self, request: HitlRequest) -> Result<()>;
    async fn pending(&self, limit: usize, risk_level: Option<RiskLevel>) -> Result<Vec<HitlRequest>>;
    async fn stats(&self) -> Result<HitlStats>;
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct HitlStats {
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
    pub timeout: u64,
}

impl HitlStats {
    pub fn record(&mut self, status: HitlStatus) {
        match status {
            HitlStatus::Pending => self.pending += 1,
            HitlStatus::Approved => self.approved += 1,
            HitlStatus::Rejected => self.rejected += 1,
            HitlStatus::Timeout => self.timeout += 1,
        }
    }
}

/// The `learning_feedback` table. Append-only.
#[async_trait]
pub trait LearningFeedbackStore: Send + Sync {
    async fn save(&self, feedback: LearningFeedback) -> Result<()>;
    async fn for_agent(&self, agent_id: &str, limit: usize) -> Result<Vec<LearningFeedback>>;
}
