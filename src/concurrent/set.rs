/*!
 * Concurrent Set
 * Membership set over the sharded map
 */

use ahash::RandomState;
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Concurrent membership set; clones share the same storage
pub struct ConcurrentSet<T>
where
    T: Eq + Hash,
{
    entries: Arc<DashMap<T, (), RandomState>>,
}

impl<T> ConcurrentSet<T>
where
    T: Eq + Hash,
{
    pub fn new() -> Self {
        Self { entries: Arc::new(DashMap::with_hasher(RandomState::new())) }
    }

    /// Returns true when the value was newly inserted
    pub fn insert(&self, value: T) -> bool {
        self.entries.insert(value, ()).is_none()
    }

    /// Returns true when the value was present
    pub fn remove(&self, value: &T) -> bool {
        self.entries.remove(value).is_some()
    }

    pub fn contains(&self, value: &T) -> bool {
        self.entries.contains_key(value)
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

impl<T> Default for ConcurrentSet<T>
where
    T: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ConcurrentSet<T>
where
    T: Eq + Hash,
{
    fn clone(&self) -> Self {
        Self { entries: Arc::clone(&self.entries) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_idempotent() {
        let set = ConcurrentSet::new();
        assert!(set.insert(3u64));
        assert!(!set.insert(3));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_remove() {
        let set = ConcurrentSet::new();
        set.insert("key");
        assert!(set.remove(&"key"));
        assert!(!set.remove(&"key"));
    }
}
