use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::{DEFAULT_NAMESPACE, KeyValueStore, namespaced_key};
use crate::errors::StorageError;

/// In-memory key-value store
///
/// Clones share the same underlying map, so several namespaces can be
/// layered over one map with `with_shared_map`.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    namespace: String,
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_namespace(DEFAULT_NAMESPACE)
    }

    pub fn with_namespace(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// A store with another namespace over the same map
    pub fn with_shared_map(&self, namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            entries: Arc::clone(&self.entries),
        }
    }

    /// Number of raw entries across all namespaces
    pub fn raw_len(&self) -> usize {
        self.entries.lock().len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(&namespaced_key(&self.namespace, key)).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .insert(namespaced_key(&self.namespace, key), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().remove(&namespaced_key(&self.namespace, key));
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let namespace = self.namespace.as_str();
        self.entries.lock().retain(|key, _| !key.starts_with(namespace));
        Ok(())
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }
}
