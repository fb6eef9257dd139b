#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use super::{Storage, StorageError, StoredValue};

/// In-memory storage implementation for testing and simulation
///
/// Uses a `HashMap` keyed by `(collection, key)`. All state is wrapped in
/// Arc<Mutex<>> to allow Clone and concurrent access. Uses `lock().expect()`
/// which will panic if the mutex is poisoned - acceptable for test code.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<HashMap<(String, String), StoredValue>>>,
}

impl MemoryStorage {
    /// Create a new empty `MemoryStorage`
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in `collection`.
    ///
    /// Useful for debugging and testing.
    #[allow(clippy::expect_used)]
    pub fn len(&self, collection: &str) -> usize {
        self.inner
            .lock()
            .expect("Mutex poisoned")
            .keys()
            .filter(|(stored_collection, _)| stored_collection == collection)
            .count()
    }

    /// True if `collection` has no entries.
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

impl Storage for MemoryStorage {
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    fn get(&self, collection: &str, key: &str) -> Result<Option<StoredValue>, StorageError> {
        let inner = self.inner.lock().expect("Mutex poisoned");

        Ok(inner.get(&(collection.to_string(), key.to_string())).cloned())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    fn set(&self, collection: &str, key: &str, value: StoredValue) -> Result<(), StorageError> {
        self.inner
            .lock()
            .expect("Mutex poisoned")
            .insert((collection.to_string(), key.to_string()), value);

        Ok(())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    fn remove(&self, collection: &str, key: &str) -> Result<(), StorageError> {
        let key = (collection.to_string(), key.to_string());
        self.inner.lock().expect("Mutex poisoned").remove(&key);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_missing_returns_none() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("modes", "alice").unwrap(), None);
    }

    #[test]
    fn set_then_get() {
        let storage = MemoryStorage::new();
        storage.set("modes", "alice", StoredValue::Int(1)).unwrap();

        assert_eq!(storage.get("modes", "alice").unwrap(), Some(StoredValue::Int(1)));
    }

    #[test]
    fn set_overwrites() {
        let storage = MemoryStorage::new();
        storage.set("flags", "f", StoredValue::Bool(true)).unwrap();
        storage.set("flags", "f", StoredValue::Bool(false)).unwrap();

        assert_eq!(storage.get("flags", "f").unwrap(), Some(StoredValue::Bool(false)));
    }

    #[test]
    fn collections_are_isolated() {
        let storage = MemoryStorage::new();
        storage.set("a", "key", StoredValue::Int(1)).unwrap();

        assert_eq!(storage.get("b", "key").unwrap(), None);
        assert_eq!(storage.len("a"), 1);
        assert!(storage.is_empty("b"));
    }

    #[test]
    fn remove_deletes_and_is_idempotent() {
        let storage = MemoryStorage::new();
        storage.set("a", "key", StoredValue::Bytes(vec![1, 2])).unwrap();

        storage.remove("a", "key").unwrap();
        storage.remove("a", "key").unwrap();

        assert_eq!(storage.get("a", "key").unwrap(), None);
    }

    #[test]
    fn clones_share_state() {
        let storage = MemoryStorage::new();
        let clone = storage.clone();
        clone.set("a", "key", StoredValue::Int(3)).unwrap();

        assert_eq!(storage.get("a", "key").unwrap(), Some(StoredValue::Int(3)));
    }
}
