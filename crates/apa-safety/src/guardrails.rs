//! Pluggable guardrail-condition evaluation (spec.md §4.3's "condition
//! semantics are pluggable" clause) plus a supplemental PII / prompt-injection
//! scanning layer, exposed as two more condition types rather than a separate
//! code path — generalized from the workspace's `governance::policy` rule
//! matching and `governance::guardrails::{PiiScanner, PromptInjectionDetector}`.

use apa_core::types::{Action, GuardrailCondition, RunContext};
use regex::Regex;

/// Evaluates one condition type. Returns `true` when the condition passes
/// (the action may proceed). Unknown condition types are handled by the
/// registry's fail-open default, never by an individual evaluator.
pub trait ConditionEvaluator: Send + Sync {
    fn condition_type(&self) -> &str;
    fn evaluate(&self, condition: &GuardrailCondition, action: &Action, context: &RunContext) -> bool;
}

/// Parameter-value predicate: `params = { "field": str, "op": "eq"|"ne"|"contains", "value": any }`
/// evaluated against `action.parameters[field]`. A missing field fails `eq`
/// (field must be present and equal) but passes `ne` (absence is a valid
/// inequality).
pub struct ParameterValueEvaluator;

impl ConditionEvaluator for ParameterValueEvaluator {
    fn condition_type(&self) -> &str {
        "parameter_value"
    }

    fn evaluate(&self, condition: &GuardrailCondition, action: &Action, _context: &RunContext) -> bool {
        let field = match condition.params.get("field").and_then(|v| v.as_str()) {
            Some(f) => f,
            None => return true,
        };
        let op = condition.params.get("op").and_then(|v| v.as_str()).unwrap_or("eq");
        let expected = condition.params.get("value");
        let actual = action.parameters.get(field);

        match op {
            "eq" => actual == expected,
            "ne" => actual != expected,
            "contains" => match (actual.and_then(|v| v.as_str()), expected.and_then(|v| v.as_str())) {
                (Some(a), Some(e)) => a.contains(e),
                _ => true,
            },
            _ => true,
        }
    }
}

/// Context-state predicate: `params = { "key": str, "must_be_present": bool }`
/// (default `true`) evaluated against `context.shared_knowledge`.
pub struct ContextStateEvaluator;

impl ConditionEvaluator for ContextStateEvaluator {
    fn condition_type(&self) -> &str {
        "context_state"
    }

    fn evaluate(&self, condition: &GuardrailCondition, _action: &Action, context: &RunContext) -> bool {
        let key = match condition.params.get("key").and_then(|v| v.as_str()) {
            Some(k) => k,
            None => return true,
        };
        let must_be_present = condition
            .params
            .get("must_be_present")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        let present = context.shared_knowledge.contains_key(key);
        present == must_be_present
    }
}

fn pii_patterns() -> Vec<Regex> {
    [
        r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}",
        r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b",
        r"\b\d{3}-\d{2}-\d{4}\b",
        r"\b\d{4}[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{4}\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
}

/// Supplemental, non-spec-mandated condition: fails when the action's
/// parameters contain what looks like PII (email, phone, SSN, credit card).
pub struct PiiScanEvaluator {
    patterns: Vec<Regex>,
}

impl PiiScanEvaluator {
    pub fn new() -> Self {
        Self { patterns: pii_patterns() }
    }
}

impl Default for PiiScanEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConditionEvaluator for PiiScanEvaluator {
    fn condition_type(&self) -> &str {
        "pii_scan"
    }

    fn evaluate(&self, _condition: &GuardrailCondition, action: &Action, _context: &RunContext) -> bool {
        let haystack = action.parameters.to_string();
        !self.patterns.iter().any(|p| p.is_match(&haystack))
    }
}

fn prompt_injection_patterns() -> Vec<Regex> {
    [
        r"(?i)ignore\s+(all\s+)?(previous|above)\s+instructions?",
        r"(?i)disregard\s+(all\s+)?(previous|above)",
        r"(?i)you\s+are\s+now\s+a",
        r"(?i)pretend\s+you\s+are",
        r"(?i)forget\s+(everything|all)",
        r"(?i)system\s*:\s*",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
}

/// Supplemental condition: fails when an action's text parameters look like
/// a prompt-injection attempt aimed at the model's next reasoning step.
pub struct PromptInjectionEvaluator {
    patterns: Vec<Regex>,
}

impl PromptInjectionEvaluator {
    pub fn new() -> Self {
        Self { patterns: prompt_injection_patterns() }
    }
}

impl Default for PromptInjectionEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConditionEvaluator for PromptInjectionEvaluator {
    fn condition_type(&self) -> &str {
        "prompt_injection_scan"
    }

    fn evaluate(&self, _condition: &GuardrailCondition, action: &Action, _context: &RunContext) -> bool {
        let haystack = action.parameters.to_string();
        !self.patterns.iter().any(|p| p.is_match(&haystack))
    }
}

/// Dispatches a condition to its evaluator by `condition_type`. Unknown
/// types pass (fail-open at this layer: guardrails express deny-rules, per
/// spec.md §4.3).
pub struct ConditionRegistry {
    evaluators: Vec<Box<dyn ConditionEvaluator>>,
}

impl ConditionRegistry {
    pub fn with_defaults() -> Self {
        Self {
            evaluators: vec![
                Box::new(ParameterValueEvaluator),
                Box::new(ContextStateEvaluator),
                Box::new(PiiScanEvaluator::new()),
                Box::new(PromptInjectionEvaluator::new()),
            ],
        }
    }

    pub fn evaluate(&self, condition: &GuardrailCondition, action: &Action, context: &RunContext) -> bool {
        match self
            .evaluators
            .iter()
            .find(|e| e.condition_type() == condition.condition_type)
        {
            Some(evaluator) => evaluator.evaluate(condition, action, context),
            None => true,
        }
    }
}

impl Default for ConditionRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
