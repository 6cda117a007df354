#![allow(clippy::expect_used, reason = "Mutex poisoning is unrecoverable in test storage")]

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use super::{BatchOp, CacheKey, Storage, StorageError, WriteBatch};

/// In-memory storage implementation for testing and simulation
///
/// Values live in a `BTreeMap` keyed by the rendered cache key, so dumps are
/// ordered and easy to compare. All state is wrapped in `Arc<Mutex<>>`; a
/// batch is applied under one lock acquisition, which makes it atomic with
/// respect to other clones.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    /// Create a new empty `MemoryStorage`
    pub fn new() -> Self {
        Self::default()
    }

    /// Rendered keys currently present, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().expect("Mutex poisoned").keys().cloned().collect()
    }

    /// Number of stored keys.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").len()
    }

    /// Whether nothing has been stored.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStorage {
    fn load(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, StorageError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        Ok(inner.get(&key.to_string()).cloned())
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");

        for op in batch {
            match op {
                BatchOp::Put { key, value } => {
                    inner.insert(key.to_string(), value);
                },
                BatchOp::Delete { key } => {
                    inner.remove(&key.to_string());
                },
            }
        }

        Ok(())
    }
}
