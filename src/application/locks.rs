use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A set of async mutexes addressed by key.
///
/// Holders of the same key are queued in FIFO order (tokio's mutex is fair);
/// holders of different keys never contend beyond the brief synchronous map
/// access. Slots are dropped once the last holder or waiter lets go.
pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &K) -> KeyedGuard<'_, K> {
        let slot = {
            let mut slots = self.slots.lock();
            slots.entry(key.clone()).or_default().clone()
        };
        let guard = slot.lock_owned().await;
        KeyedGuard {
            locks: self,
            key: key.clone(),
            _guard: guard,
        }
    }

    /// Number of keys currently locked or waited on.
    pub fn active_keys(&self) -> usize {
        self.slots.lock().len()
    }
}

pub struct KeyedGuard<'a, K: Eq + Hash + Clone> {
    locks: &'a KeyedLocks<K>,
    key: K,
    _guard: OwnedMutexGuard<()>,
}

impl<K: Eq + Hash + Clone> Drop for KeyedGuard<'_, K> {
    fn drop(&mut self) {
        let mut slots = self.locks.slots.lock();
        // One reference lives in the map, one in our owned guard; anything
        // above that is a waiter that still needs the slot.
        if slots
            .get(&self.key)
            .is_some_and(|slot| Arc::strong_count(slot) <= 2)
        {
            slots.remove(&self.key);
        }
    }
}
