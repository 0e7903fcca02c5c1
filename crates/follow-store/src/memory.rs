use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::traits::{check_key, LocalStore};

/// In-memory, HashMap-based document store.
///
/// Intended for tests and embedding. Documents are cloned on read and write.
pub struct InMemoryLocalStore {
    documents: RwLock<HashMap<String, Value>>,
}

impl InMemoryLocalStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
        }
    }

    /// Number of documents currently stored.
    pub fn len(&self) -> usize {
        self.documents.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted list of stored keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .documents
            .read()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

impl Default for InMemoryLocalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStore for InMemoryLocalStore {
    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let map = self.documents.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map.get(key).cloned())
    }

    fn put(&self, key: &str, document: &Value) -> StoreResult<()> {
        check_key(key)?;
        let mut map = self.documents.write().map_err(|_| StoreError::Poisoned)?;
        map.insert(key.to_string(), document.clone());
        Ok(())
    }

    fn has(&self, key: &str) -> StoreResult<bool> {
        let map = self.documents.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map.contains_key(key))
    }
}

impl std::fmt::Debug for InMemoryLocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLocalStore")
            .field("document_count", &self.len())
            .finish()
    }
}
