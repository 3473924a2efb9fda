//! Per-identifier mutual exclusion for operations that mutate an image's
//! artifact tree.
//!
//! Generation and deletion of the same identifier are serialized; different
//! identifiers never contend. Entries are dropped from the map once no task
//! holds or waits on them.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Keyed async locks.
#[derive(Default)]
pub struct IdLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl IdLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`.
    ///
    /// Access lasts until the returned guard is dropped.
    pub async fn acquire(&self, id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;

            // Prune locks nobody holds or waits on
            locks.retain(|key, lock| key == id || Arc::strong_count(lock) > 1);

            locks
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        lock.lock_owned().await
    }

    /// Number of identifiers currently tracked.
    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}
