use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A configured actor: model, provider, budget, and feature flags.
/// Immutable for the duration of a run; created and owned externally, the
/// core only ever reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub model: String,
    pub provider: String,
    /// Integer 0-10 scale, mapped to `[0.0, 1.0]` by the reasoning engine.
    pub temperature: u8,
    pub max_tokens: u32,
    pub tools: Vec<String>,
    pub system_prompt: Option<String>,
    pub max_iterations: usize,

    #[serde(default = "default_true")]
    pub enable_memory: bool,
    #[serde(default = "default_true")]
    pub enable_tools: bool,
    #[serde(default)]
    pub enable_learning: bool,
    #[serde(default)]
    pub enable_collaboration: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_guardrails: Option<SafetyGuardrails>,

    #[serde(default)]
    pub metadata: Value,
}

fn default_true() -> bool {
    true
}

impl Agent {
    pub fn system_prompt_or_default(&self) -> String {
        self.system_prompt
            .clone()
            .unwrap_or_else(|| "You are a helpful AI agent.".to_string())
    }

    pub fn temperature_fraction(&self) -> f32 {
        (self.temperature.min(10) as f32) / 10.0
    }
}

/// Per-agent guardrail configuration: hard blocks, a high-risk override, and
/// pluggable conditions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafetyGuardrails {
    #[serde(default)]
    pub blocked_actions: Vec<String>,
    #[serde(default)]
    pub allow_high_risk: bool,
    #[serde(default)]
    pub conditions: Vec<GuardrailCondition>,
}

/// A single pluggable guardrail condition. `condition_type` selects the
/// evaluator; `params` is an open map interpreted by that evaluator.
/// Unknown condition types pass (fail-open: guardrails express deny-rules).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailCondition {
    pub name: String,
    pub condition_type: String,
    #[serde(default)]
    pub params: Value,
}
