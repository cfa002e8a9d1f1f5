//! Error taxonomy for the APA execution core.
//!
//! Variants map onto the error design in the execution contract: most of
//! them never reach a caller as an `Err` at all (tool errors become
//! observations, safety blocks and HITL timeouts are normal control
//! outcomes) but are still useful as typed values inside the subsystems that
//! produce them.

use thiserror::Error;

/// Result type alias used across every crate in the workspace.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input to a public operation (bad id, unknown enum value).
    /// Surfaced directly to the caller; never stored on a run.
    #[error("validation error: {0}")]
    Validation(String),

    /// Model-provider transport or quota error. Caught by the reasoning
    /// engine, which falls back to the mock response.
    #[error("model provider error: {0}")]
    Provider(String),

    /// Encapsulated in an observation by the tool registry; should not
    /// normally escape as a Rust error.
    #[error("tool error: {0}")]
    Tool(String),

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Not a failure outcome per se, but typed so the safety engine can
    /// return it from `validate_action` plumbing.
    #[error("action blocked by safety engine: {0}")]
    SafetyBlock(String),

    /// Normal outcome of an HITL wait; surfaces to the loop as a `rejected`
    /// decision, not an error path.
    #[error("HITL request {0} timed out")]
    HitlTimeout(String),

    /// Responding to, or awaiting, a HITL request whose status already left
    /// `pending`.
    #[error("HITL request {0} is not pending: {1}")]
    HitlInvalidState(String, String),

    /// Uncaught persistence failure. Aborts the loop; the run is marked
    /// `error` before this propagates.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Cooperative cancellation signal observed at an iteration boundary.
    #[error("execution cancelled")]
    Cancellation,

    #[error("budget exceeded: used {used}, limit {limit}")]
    BudgetExceeded { used: u64, limit: u64 },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    pub fn tool(msg: impl Into<String>) -> Self {
        Self::Tool(msg.into())
    }

    pub fn tool_not_found(name: impl Into<String>) -> Self {
        Self::ToolNotFound(name.into())
    }

    pub fn safety_block(msg: impl Into<String>) -> Self {
        Self::SafetyBlock(msg.into())
    }

    pub fn hitl_timeout(request_id: impl Into<String>) -> Self {
        Self::HitlTimeout(request_id.into())
    }

    pub fn hitl_invalid_state(request_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self::HitlInvalidState(request_id.into(), status.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
