use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::action::{Action, Observation};
use super::memory::RelevantMemory;

/// The per-run context built by the context manager at `INIT` and folded
/// into on every step. Not shared across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunContext {
    pub agent_id: String,
    pub execution_id: String,
    pub task_description: String,
    pub timestamp: DateTime<Utc>,
    pub relevant_memories: Vec<RelevantMemory>,
    #[serde(default)]
    pub shared_knowledge: Map<String, Value>,
    #[serde(default)]
    pub action_history: Vec<ActionHistoryEntry>,
}

impl RunContext {
    pub fn new(
        agent_id: impl Into<String>,
        execution_id: impl Into<String>,
        task_description: impl Into<String>,
        relevant_memories: Vec<RelevantMemory>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            execution_id: execution_id.into(),
            task_description: task_description.into(),
            timestamp: Utc::now(),
            relevant_memories,
            shared_knowledge: Map::new(),
            action_history: Vec::new(),
        }
    }

    /// Fold one completed step into the context: appends to the action
    /// history and, on a successful observation carrying a result, updates
    /// `shared_knowledge[action.type]` (last-writer-wins per action type).
    pub fn record_step(&mut self, action: Action, observation: Observation) {
        if observation.is_success() {
            if let Some(result) = observation.result.clone() {
                self.shared_knowledge
                    .insert(action.r#type.clone(), result);
            }
        }
        self.action_history.push(ActionHistoryEntry {
            action,
            observation,
            timestamp: Utc::now(),
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionHistoryEntry {
    pub action: Action,
    pub observation: Observation,
    pub timestamp: DateTime<Utc>,
}
