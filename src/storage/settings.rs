use log::warn;
use std::sync::Arc;

use super::{API_KEY_KEY, CUSTOM_PROMPT_KEY, KeyValueStore};
use crate::errors::StorageError;

/// Typed access to the persisted user settings
#[derive(Clone)]
pub struct Settings {
    store: Arc<dyn KeyValueStore>,
}

impl Settings {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Persisted API credential; read failures are treated as absent
    pub fn api_key(&self) -> Option<String> {
        self.read(API_KEY_KEY)
    }

    pub fn set_api_key(&self, key: &str) -> Result<(), StorageError> {
        self.store.set(API_KEY_KEY, key.trim())
    }

    /// Persisted behaviour instruction; read failures are treated as absent
    pub fn custom_instruction(&self) -> Option<String> {
        self.read(CUSTOM_PROMPT_KEY)
    }

    /// Store an instruction, or remove it when blank
    pub fn set_custom_instruction(&self, instruction: &str) -> Result<(), StorageError> {
        if instruction.trim().is_empty() {
            self.store.remove(CUSTOM_PROMPT_KEY)
        } else {
            self.store.set(CUSTOM_PROMPT_KEY, instruction)
        }
    }

    /// Remove every persisted value of the namespace, glossary included
    pub fn clear_all(&self) -> Result<(), StorageError> {
        self.store.clear()
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value.filter(|v| !v.trim().is_empty()),
            Err(e) => {
                warn!("Failed to read setting '{}': {}", key, e);
                None
            }
        }
    }
}
