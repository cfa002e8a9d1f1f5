//! Per-run advisory lock: at most one executor drives a given `run_id` at a
//! time (spec.md §5). Grounded in the workspace's DashMap-based registries;
//! re-entry is a validation error, never a panic or a silent queue-up.

use std::sync::Arc;

use dashmap::DashMap;

use apa_core::error::{Error, Result};

#[derive(Default)]
pub struct RunLock {
    held: Arc<DashMap<String, ()>>,
}

impl RunLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for `run_id`, or fails if another in-flight call
    /// already holds it. The returned guard releases it on drop.
    pub fn acquire(&self, run_id: &str) -> Result<RunLockGuard> {
        if self.held.insert(run_id.to_string(), ()).is_some() {
            return Err(Error::validation(format!(
                "execution '{run_id}' already has an executor running"
            )));
        }
        Ok(RunLockGuard {
            held: self.held.clone(),
            run_id: run_id.to_string(),
        })
    }
}

pub struct RunLockGuard {
    held: Arc<DashMap<String, ()>>,
    run_id: String,
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        self.held.remove(&self.run_id);
    }
}
