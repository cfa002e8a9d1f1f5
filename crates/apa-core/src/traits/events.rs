use async_trait::async_trait;

use crate::events::EventEnvelope;

/// Sink for structured audit events. Implementations may fan out to a log
/// stream, a message bus, or (in tests) a `Vec` collector.
#[async_trait]
pub trait EventEmitter: Send + Sync {
    async fn emit(&self, event: EventEnvelope);
}

/// Default sink: discards everything. Used when no observer is wired in.
pub struct NoOpEventEmitter;

#[async_trait]
impl EventEmitter for NoOpEventEmitter {
    async fn emit(&self, _event: EventEnvelope) {}
}
