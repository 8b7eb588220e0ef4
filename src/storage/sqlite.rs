/*!
 * SQLite-backed key-value store.
 *
 * Keys are stored fully namespaced in one `kv_store` table, so several
 * namespaces can share a database file.
 */

use log::{debug, info};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{DEFAULT_NAMESPACE, KeyValueStore, namespaced_key, schema};
use crate::errors::StorageError;

/// Default database filename
const DEFAULT_DB_FILENAME: &str = "subtx.db";

/// Default database directory name under user's data directory
const DEFAULT_DB_DIRNAME: &str = "subtx";

/// Key-value store persisted in SQLite
#[derive(Clone)]
pub struct SqliteStore {
    /// Path to the database file
    db_path: PathBuf,
    /// Namespace prepended to every key
    namespace: String,
    /// Shared connection
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a store at the default location
    pub fn open_default(namespace: &str) -> Result<Self, StorageError> {
        let db_path = Self::default_database_path()?;
        Self::open(&db_path, namespace)
    }

    /// Open (or create) a store at the given path
    pub fn open<P: AsRef<Path>>(db_path: P, namespace: &str) -> Result<Self, StorageError> {
        let db_path = db_path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        info!("Opening settings database at: {:?}", db_path);

        let conn = Connection::open(&db_path)?;
        schema::initialize_schema(&conn)?;

        Ok(Self {
            db_path,
            namespace: namespace.to_string(),
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, StorageError> {
        debug!("Creating in-memory settings database");

        let conn = Connection::open_in_memory()?;
        schema::initialize_schema(&conn)?;

        Ok(Self {
            db_path: PathBuf::from(":memory:"),
            namespace: DEFAULT_NAMESPACE.to_string(),
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    /// A store with another namespace over the same connection
    pub fn with_namespace(&self, namespace: &str) -> Self {
        Self {
            db_path: self.db_path.clone(),
            namespace: namespace.to_string(),
            connection: Arc::clone(&self.connection),
        }
    }

    /// Get the default database path
    pub fn default_database_path() -> Result<PathBuf, StorageError> {
        let base_dir = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
            .ok_or_else(|| StorageError::Unavailable("Could not determine data directory".to_string()))?;

        Ok(base_dir.join(DEFAULT_DB_DIRNAME).join(DEFAULT_DB_FILENAME))
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Bare keys currently stored under this namespace
    pub fn keys(&self) -> Result<Vec<String>, StorageError> {
        let conn = self.connection.lock();
        let mut stmt = conn.prepare("SELECT key FROM kv_store WHERE substr(key, 1, ?1) = ?2 ORDER BY key")?;
        let rows = stmt.query_map(params![self.namespace.chars().count() as i64, self.namespace], |row| {
            row.get::<_, String>(0)
        })?;

        let mut keys = Vec::new();
        for key in rows {
            let key = key?;
            keys.push(key[self.namespace.len()..].to_string());
        }
        Ok(keys)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.connection.lock();
        let value = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                [namespaced_key(&self.namespace, key)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.connection.lock();
        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![namespaced_key(&self.namespace, key), value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let conn = self.connection.lock();
        conn.execute(
            "DELETE FROM kv_store WHERE key = ?1",
            [namespaced_key(&self.namespace, key)],
        )?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let conn = self.connection.lock();
        // substr rather than LIKE: namespaces may contain `_`, a LIKE wildcard
        let removed = conn.execute(
            "DELETE FROM kv_store WHERE substr(key, 1, ?1) = ?2",
            params![self.namespace.chars().count() as i64, self.namespace],
        )?;
        debug!("Cleared {} keys in namespace '{}'", removed, self.namespace);
        Ok(())
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }
}
