use crate::ranking::error::RunInProgress;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// In-process single-flight guard for ranking runs. Clones share the same lock.
#[derive(Debug, Clone, Default)]
pub struct RunLock {
    inner: Arc<Mutex<()>>,
}

/// Held for the duration of a run; dropping it frees the lock.
#[derive(Debug)]
pub struct RunGuard {
    _guard: OwnedMutexGuard<()>,
}

impl RunLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never waits: a run already in progress is reported, not queued behind.
    pub fn try_acquire(&self) -> Result<RunGuard, RunInProgress> {
        Arc::clone(&self.inner)
            .try_lock_owned()
            .map(|guard| RunGuard { _guard: guard })
            .map_err(|_| RunInProgress)
    }

    pub fn is_running(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}
