/*!
 * Concurrent Map
 * Sharded hash map for shared lookup tables
 */

use ahash::RandomState;
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Concurrent key-value map; clones share the same storage
pub struct ConcurrentMap<K, V>
where
    K: Eq + Hash,
{
    entries: Arc<DashMap<K, V, RandomState>>,
}

impl<K, V> ConcurrentMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self { entries: Arc::new(DashMap::with_hasher(RandomState::new())) }
    }

    /// Insert or replace, returning the previous value if any
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl<K, V> ConcurrentMap<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }
}

impl<K, V> Default for ConcurrentMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for ConcurrentMap<K, V>
where
    K: Eq + Hash,
{
    fn clone(&self) -> Self {
        Self { entries: Arc::clone(&self.entries) }
    }
}
