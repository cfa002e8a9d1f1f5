//! Action-type risk classification, spec.md §4.3's built-in table.

use apa_core::types::RiskLevel;

/// Actions that require human approval regardless of their classified risk
/// level, unless the agent's guardrails set `allow_high_risk`. A module
/// constant, not reachable via guardrail config — matches the original
/// source's `REQUIRES_APPROVAL` list.
pub const REQUIRES_APPROVAL: &[&str] = &["data_deletion", "financial_transaction", "user_communication"];

/// Classifies an action type by the built-in table. Unknown types default
/// to `medium`, resolving spec.md §9's noted ambiguity (the original source
/// leaves `calculate`, `search`, `http_request` etc. unclassified).
pub fn classify(action_type: &str) -> RiskLevel {
    match action_type {
        "data_deletion" | "financial_transaction" => RiskLevel::Critical,
        "user_communication" => RiskLevel::High,
        "data_modification" => RiskLevel::Medium,
        "data_read" | "calculation" => RiskLevel::Low,
        _ => RiskLevel::Medium,
    }
}

pub fn requires_approval(action_type: &str) -> bool {
    REQUIRES_APPROVAL.contains(&action_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_types_classify_as_documented() {
        assert_eq!(classify("data_deletion"), RiskLevel::Critical);
        assert_eq!(classify("financial_transaction"), RiskLevel::Critical);
        assert_eq!(classify("user_communication"), RiskLevel::High);
        assert_eq!(classify("data_modification"), RiskLevel::Medium);
        assert_eq!(classify("data_read"), RiskLevel::Low);
        assert_eq!(classify("calculation"), RiskLevel::Low);
    }

    #[test]
    fn unknown_types_default_to_medium() {
        assert_eq!(classify("search"), RiskLevel::Medium);
        assert_eq!(classify("http_request"), RiskLevel::Medium);
        assert_eq!(classify("anything_else"), RiskLevel::Medium);
    }

    #[test]
    fn requires_approval_set_is_exact() {
        assert!(requires_approval("data_deletion"));
        assert!(requires_approval("financial_transaction"));
        assert!(requires_approval("user_communication"));
        assert!(!requires_approval("data_modification"));
        assert!(!requires_approval("calculation"));
    }
}
