//! Per-key serialization for import work
//!
//! Items with different idempotency keys proceed concurrently; items sharing a
//! key take turns. The store's uniqueness check remains the final arbiter, the
//! lock only keeps same-key items from racing through lookup and create.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-key async lock manager
pub struct KeyLockManager {
    locks: Arc<RwLock<HashMap<String, Arc<Mutex<()>>>>>,
}

impl KeyLockManager {
    pub fn new() -> Self {
        Self {
            locks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        {
            let map = self.locks.read();
            if let Some(lock) = map.get(key) {
                return lock.clone();
            }
        }

        let mut map = self.locks.write();
        // Double-check after acquiring write lock
        map.entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Wait for exclusive access to `key`.
    ///
    /// The guard owns its lock, so it can be held across await points.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        self.key_lock(key).lock_owned().await
    }

    /// Drop locks nobody holds or waits on.
    pub fn prune(&self) {
        self.locks
            .write()
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Number of keys with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for KeyLockManager {
    fn default() -> Self {
        Self::new()
    }
}
