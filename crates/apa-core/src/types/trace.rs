use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::action::{Action, Observation};

/// One persisted step of the ReAct loop; the audit unit of the system.
/// Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningTrace {
    pub id: String,
    pub run_id: String,
    pub agent_id: String,
    /// Monotonically increasing, starting at 0, contiguous for a run.
    pub step_index: u32,
    pub thought: String,
    pub action: Action,
    pub observation: Observation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection: Option<String>,
    pub tokens_used: u64,
    pub latency_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl ReasoningTrace {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        run_id: impl Into<String>,
        agent_id: impl Into<String>,
        step_index: u32,
        thought: impl Into<String>,
        action: Action,
        observation: Observation,
        reflection: Option<String>,
        tokens_used: u64,
        latency_ms: u64,
    ) -> Self {
        Self {
            id: id.into(),
            run_id: run_id.into(),
            agent_id: agent_id.into(),
            step_index,
            thought: thought.into(),
            action,
            observation,
            reflection,
            tokens_used,
            latency_ms,
            created_at: Utc::now(),
        }
    }
}
