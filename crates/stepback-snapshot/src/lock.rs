//! Per-project mutual exclusion.
//!
//! Every engine operation on a project runs inside [`LockRegistry::with_lock`].
//! Operations on the same project run one at a time in arrival order
//! (tokio's mutex is fair); different projects never wait on each other.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as AsyncMutex;
use tracing::trace;

/// Registry of per-project async locks.
///
/// Cloning shares the registry. Entries are created on first use and
/// dropped again once nobody holds or waits for them.
#[derive(Debug, Clone, Default)]
pub struct LockRegistry {
    locks: Arc<Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `operation` while holding the lock for `project`.
    ///
    /// The lock is released when the operation finishes, whether it
    /// succeeded or failed.
    pub async fn with_lock<F, T>(&self, project: &Path, operation: F) -> T
    where
        F: Future<Output = T>,
    {
        let key = stepback_util::path::project_key(project);
        let lock = self.entry(&key);

        let result = {
            let _guard = lock.lock().await;
            trace!(project = %key.display(), "Acquired project lock");
            operation.await
        };

        drop(lock);
        self.release(&key);
        result
    }

    /// Number of projects with a live lock entry.
    pub fn active(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn entry(&self, key: &Path) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            locks
                .entry(key.to_path_buf())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    fn release(&self, key: &Path) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map itself still references the lock: no holder, no waiter.
        if locks
            .get(key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(key);
        }
    }
}
