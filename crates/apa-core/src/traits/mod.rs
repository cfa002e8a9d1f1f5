mod events;
mod store;

pub use events::{EventEmitter, NoOpEventEmitter};
pub use store::{
    AgentStore, ExecutionStore, HitlStats, HitlStore, LearningFeedbackStore, MemoryRepository,
    TraceStore,
};
