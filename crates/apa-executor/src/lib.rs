//! Execution core: the ReAct control loop, the per-run advisory lock, and
//! the `ApaExecutionCore` facade that wires every subsystem into the single
//! request boundary described in spec.md §6.

pub mod facade;
pub mod lock;
pub mod react;

pub use facade::ApaExecutionCore;
pub use lock::{RunLock, RunLockGuard};
pub use react::Executor;
