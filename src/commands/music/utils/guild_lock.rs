//! Keyed mutual exclusion.
//!
//! Each key owns one slot: an async mutex around an optional value. Tasks
//! locking the same key queue up in FIFO order (tokio's mutex is fair); tasks
//! on different keys never wait on each other. A slot stays in the map once
//! created, so a value can be taken out and recreated later without two
//! lockers ever seeing different mutexes for the same key.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub type SlotGuard<T> = OwnedMutexGuard<Option<T>>;

pub struct KeyedLock<K, T> {
    slots: DashMap<K, Arc<Mutex<Option<T>>>>,
}

impl<K, T> Default for KeyedLock<K, T>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }
}

impl<K, T> KeyedLock<K, T>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`, creating an empty slot on first use.
    pub async fn lock(&self, key: K) -> SlotGuard<T> {
        // The map guard must be released before awaiting the mutex.
        let slot = Arc::clone(self.slots.entry(key).or_default().value());
        slot.lock_owned().await
    }

    /// Like [`KeyedLock::lock`], but never creates a slot.
    pub async fn lock_existing(&self, key: &K) -> Option<SlotGuard<T>> {
        let slot = self.slots.get(key).map(|entry| Arc::clone(entry.value()))?;
        Some(slot.lock_owned().await)
    }

    /// Number of slots ever created.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
