//! `SafetyEngine`: the single source of truth for whether an action may
//! proceed, and the entry point for HITL escalation.

use std::sync::Arc;

use apa_core::error::Result;
use apa_core::traits::{HitlStats, HitlStore};
use apa_core::types::{Action, HitlDecision, HitlRequest, RiskLevel, RunContext, SafetyGuardrails};

use crate::classify::{classify, requires_approval};
use crate::guardrails::ConditionRegistry;
use crate::hitl::ApprovalGate;

/// Outcome of `validate_action`, mirroring the original's validation result
/// shape: allowed/blocked, the reason when blocked, whether the caller must
/// escalate to HITL, and the classified risk level either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub allowed: bool,
    pub requires_human_approval: bool,
    pub reason: Option<String>,
    pub risk_level: RiskLevel,
}

impl ValidationResult {
    fn allow(risk_level: RiskLevel) -> Self {
        Self {
            allowed: true,
            requires_human_approval: false,
            reason: None,
            risk_level,
        }
    }

    fn block(risk_level: RiskLevel, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            requires_human_approval: false,
            reason: Some(reason.into()),
            risk_level,
        }
    }

    fn escalate(risk_level: RiskLevel, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            requires_human_approval: true,
            reason: Some(reason.into()),
            risk_level,
        }
    }
}

pub struct SafetyEngine {
    conditions: ConditionRegistry,
    approval_gate: Arc<dyn ApprovalGate>,
    hitl_store: Arc<dyn HitlStore>,
}

impl SafetyEngine {
    pub fn new(approval_gate: Arc<dyn ApprovalGate>, hitl_store: Arc<dyn HitlStore>) -> Self {
        Self {
            conditions: ConditionRegistry::with_defaults(),
            approval_gate,
            hitl_store,
        }
    }

    /// Evaluates an action against an agent's guardrails, in the exact order
    /// spec.md §4.3 enumerates: explicit block list, then the
    /// `REQUIRES_APPROVAL` set gated by `allow_high_risk`, then per-condition
    /// evaluation, then allow.
    #[tracing::instrument(skip(self, guardrails, context), fields(action_type = %action.r#type))]
    pub fn validate_action(
        &self,
        action: &Action,
        guardrails: Option<&SafetyGuardrails>,
        context: &RunContext,
    ) -> ValidationResult {
        let risk_level = classify(&action.r#type);
        let empty = SafetyGuardrails::default();
        let guardrails = guardrails.unwrap_or(&empty);

        if guardrails.blocked_actions.iter().any(|blocked| blocked == &action.r#type) {
            return ValidationResult::block(
                risk_level,
                format!("action '{}' is blocked by agent guardrails", action.r#type),
            );
        }

        if requires_approval(&action.r#type) && !guardrails.allow_high_risk {
            return ValidationResult::escalate(
                risk_level,
                format!("action '{}' requires human approval", action.r#type),
            );
        }

        for condition in &guardrails.conditions {
            if !self.conditions.evaluate(condition, action, context) {
                return ValidationResult::block(
                    risk_level,
                    format!("guardrail condition failed: {}", condition.name),
                );
            }
        }

        ValidationResult::allow(risk_level)
    }

    pub async fn request_human_approval(
        &self,
        run_id: &str,
        agent_id: &str,
        action: &Action,
        reason: &str,
        risk_level: RiskLevel,
    ) -> Result<HitlRequest> {
        self.approval_gate
            .request_human_approval(run_id, agent_id, action, reason, risk_level)
            .await
    }

    pub async fn respond(
        &self,
        request_id: &str,
        user_id: &str,
        decision: HitlDecision,
        feedback: Option<String>,
    ) -> Result<HitlRequest> {
        self.approval_gate.respond(request_id, user_id, decision, feedback).await
    }

    pub async fn pending(&self, limit: usize, risk_level: Option<RiskLevel>) -> Result<Vec<HitlRequest>> {
        self.hitl_store.pending(limit, risk_level).await
    }

    pub async fn stats(&self) -> Result<HitlStats> {
        self.hitl_store.stats().await
    }
}
