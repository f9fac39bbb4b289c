//! Per-key async mutexes.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Idle entries are dropped once the map grows past this.
const PRUNE_THRESHOLD: usize = 1024;

/// A set of async mutexes, one per key, created on first use.
///
/// Operations on the same key are serialized; different keys proceed in
/// parallel. Multi-key acquisition always locks in ascending key order so two
/// callers locking overlapping sets cannot deadlock.
pub struct KeyedLocks<K> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K> Default for KeyedLocks<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self { locks: DashMap::new() }
    }
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Ord + Copy,
{
    /// Creates an empty lock set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for and holds the lock of `key`.
    pub async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        self.prune();
        // The shard guard is released at the end of this statement, before awaiting.
        let mutex = Arc::clone(&self.locks.entry(key).or_default());
        mutex.lock_owned().await
    }

    /// Waits for and holds the locks of every key, in ascending order.
    pub async fn lock_many(&self, keys: impl IntoIterator<Item = K>) -> Vec<OwnedMutexGuard<()>> {
        let mut keys: Vec<K> = keys.into_iter().collect();
        keys.sort_unstable();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            guards.push(self.lock(key).await);
        }
        guards
    }

    /// Returns the number of keys currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Returns true if no key is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    fn prune(&self) {
        if self.locks.len() > PRUNE_THRESHOLD {
            // Only the map holds an idle mutex; anything else means held or awaited.
            self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
        }
    }
}
