use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::action::Action;

/// A human-approval gate. Created by the safety engine, mutated exactly once
/// by an operator reply or by the timeout sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitlRequest {
    pub id: String,
    pub run_id: String,
    pub agent_id: String,
    pub request_type: HitlRequestType,
    pub reason: String,
    pub action_details: Action,
    pub risk_level: RiskLevel,
    pub status: HitlStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<HitlDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<String>,
    pub requested_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responded_by: Option<String>,
}

impl HitlRequest {
    pub fn is_pending(&self) -> bool {
        self.status == HitlStatus::Pending
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitlRequestType {
    ActionApproval,
    DecisionInput,
    ErrorResolution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn score(self) -> u8 {
        match self {
            RiskLevel::Low => 10,
            RiskLevel::Medium => 30,
            RiskLevel::High => 60,
            RiskLevel::Critical => 90,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitlStatus {
    Pending,
    Approved,
    Rejected,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitlDecision {
    Approve,
    Reject,
    Modify,
}
