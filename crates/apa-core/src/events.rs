//! Structured audit events emitted by the control loop. Not part of the
//! persisted data model (that's `ReasoningTrace`/`HitlRequest`/...) but a
//! parallel, lower-latency stream consumers can subscribe to for live
//! observability.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: String,
    pub run_id: String,
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    pub fn new(
        run_id: impl Into<String>,
        agent_id: impl Into<String>,
        event_type: EventType,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            run_id: run_id.into(),
            agent_id: agent_id.into(),
            timestamp: Utc::now(),
            event_type,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    ReasoningStarted,
    ReasoningFinished,
    ActionProposed,
    SafetyEvaluated,
    ApprovalRequested,
    ApprovalDecided,
    ToolExecStarted,
    ToolExecFinished,
    RunTerminated,
}
