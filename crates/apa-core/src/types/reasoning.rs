use serde::{Deserialize, Serialize};

use super::action::Action;

/// The reasoning engine's public contract result: spec.md §4.2's
/// `{reasoning, action, reflection?, tokens_used, latency_ms}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningOutput {
    pub reasoning: String,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection: Option<String>,
    pub tokens_used: u64,
    pub latency_ms: u64,
}
