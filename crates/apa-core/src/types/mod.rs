mod action;
mod agent;
mod context;
mod execution;
mod feedback;
mod hitl;
mod memory;
mod reasoning;
mod trace;

pub use action::{Action, Observation};
pub use agent::{Agent, GuardrailCondition, SafetyGuardrails};
pub use context::{ActionHistoryEntry, RunContext};
pub use execution::{Execution, ExecutionResult, ExecutionResultStatus, ExecutionStatus, Task};
pub use feedback::{LearningFeedback, Outcome};
pub use hitl::{HitlDecision, HitlRequest, HitlRequestType, HitlStatus, RiskLevel};
pub use memory::{MemoryItem, MemoryType, RelevantMemory};
pub use reasoning::ReasoningOutput;
pub use trace::ReasoningTrace;
