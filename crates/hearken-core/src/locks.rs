//! Per-listener mutual exclusion

use crate::types::ListenerId;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Async locks keyed by listener id.
///
/// Operations on the same id run one at a time; distinct ids never contend
/// beyond the shard lock of the map lookup.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: DashMap<ListenerId, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`
    pub async fn lock(&self, id: ListenerId) -> OwnedMutexGuard<()> {
        let mutex = self.locks.entry(id).or_default().clone();
        mutex.lock_owned().await
    }

    /// Drop the lock entry for a deleted listener if nobody is holding or
    /// waiting on it
    pub fn forget(&self, id: ListenerId) {
        self.locks
            .remove_if(&id, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    /// Number of tracked ids
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
