//! Per-shape mutexes.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use super::shape::ShapeId;

/// A registry of mutexes keyed by shape identifier.
///
/// Two threads asking for the same identifier value get the same mutex;
/// different identifiers never contend. Entries are released once the shape
/// is cached, so the registry only holds shapes that are being built.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: DashMap<ShapeId, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the mutex for a key, creating it if needed.
    pub fn get(&self, key: &ShapeId) -> Arc<Mutex<()>> {
        self.locks.entry(key.clone()).or_default().clone()
    }

    /// Drop the mutex for a key.
    ///
    /// Threads already holding a clone keep using it; later callers get a
    /// fresh mutex and must re-check whatever the lock protected.
    pub fn release(&self, key: &ShapeId) {
        self.locks.remove(key);
    }

    /// Number of live mutexes.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::shape::shallow_id;
    use slimfetch_proto::SelectionSet;

    #[test]
    fn test_same_key_same_mutex() {
        let locks = KeyedLocks::new();
        let a = shallow_id("Book", &SelectionSet::new().field("id"));
        let b = shallow_id("Book", &SelectionSet::new().field("id"));
        let c = shallow_id("Book", &SelectionSet::new().field("title"));

        assert!(Arc::ptr_eq(&locks.get(&a), &locks.get(&b)));
        assert!(!Arc::ptr_eq(&locks.get(&a), &locks.get(&c)));
        assert_eq!(locks.len(), 2);
    }

    #[test]
    fn test_different_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let a = shallow_id("Book", &SelectionSet::new().field("id"));
        let c = shallow_id("Person", &SelectionSet::new().field("id"));

        let held = locks.get(&a);
        let _guard = held.lock();
        assert!(locks.get(&c).try_lock().is_some());
        assert!(locks.get(&a).try_lock().is_none());
    }

    #[test]
    fn test_release() {
        let locks = KeyedLocks::new();
        let a = shallow_id("Book", &SelectionSet::new().field("id"));
        let first = locks.get(&a);
        locks.release(&a);
        assert!(locks.is_empty());
        assert!(!Arc::ptr_eq(&first, &locks.get(&a)));
    }
}
