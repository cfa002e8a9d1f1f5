//! Safety Engine and HITL (spec.md §4.3): action-risk classification,
//! guardrail evaluation, and human-approval gating.

pub mod classify;
pub mod engine;
pub mod guardrails;
pub mod hitl;

pub use classify::{classify, requires_approval, REQUIRES_APPROVAL};
pub use engine::{SafetyEngine, ValidationResult};
pub use guardrails::{ConditionEvaluator, ConditionRegistry};
pub use hitl::{ApprovalGate, AutoRejectDiagnosticGate, BlockingApprovalGate};
