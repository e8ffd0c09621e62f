//! In-memory identifier store.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::core::{IdentifierStore, StoreError};

/// Key/value store backed by a `HashMap`; many readers, one writer.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub fn insert(&self, key: Vec<u8>, value: Vec<u8>) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IdentifierStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))?;
        Ok(records.get(key).cloned())
    }
}
