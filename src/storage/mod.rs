/*!
 * Persistence for the glossary and user settings.
 *
 * Everything persisted is a string value under a string key, scoped by an
 * application namespace. Two backends are provided:
 * - `MemoryStore`, a process-local map used by tests and dry runs
 * - `SqliteStore`, a single-table SQLite database that survives restarts
 */

pub mod memory;
pub mod schema;
pub mod settings;
pub mod sqlite;

use crate::errors::StorageError;

// Re-export main types
pub use memory::MemoryStore;
pub use settings::Settings;
pub use sqlite::SqliteStore;

/// Default key namespace
pub const DEFAULT_NAMESPACE: &str = "subtitle_translator_";

/// Key of the persisted API credential
pub const API_KEY_KEY: &str = "api_key";

/// Key of the persisted custom behaviour instruction
pub const CUSTOM_PROMPT_KEY: &str = "custom_prompt";

/// Key of the persisted glossary (JSON object)
pub const GLOSSARY_KEY: &str = "proper_nouns";

/// Namespaced string key-value store
///
/// Implementations prefix every key with their namespace; callers only ever
/// see bare keys. `clear` removes the keys of this namespace and nothing else.
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value; deleting an absent key is not an error
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Delete every key of this namespace
    fn clear(&self) -> Result<(), StorageError>;

    /// Namespace prepended to keys
    fn namespace(&self) -> &str;
}

/// Full key as stored by a backend
pub fn namespaced_key(namespace: &str, key: &str) -> String {
    format!("{}{}", namespace, key)
}
