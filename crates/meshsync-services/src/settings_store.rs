//! Persistent key/value storage for user settings.
//!
//! Values are stored as strings, one row per key, so each setting can be read
//! and written independently.

use std::path::Path;

use chrono::Utc;
use meshsync_core::{RusqliteErrorExt, StorageError};
use rusqlite::{params, Connection, OptionalExtension};

/// String key/value storage that survives process restarts.
pub trait SettingsStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// SQLite-backed settings store.
pub struct SqliteSettingsStore {
    conn: Connection,
}

impl SqliteSettingsStore {
    /// Open (or create) the store at `path`, creating parent directories.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::OpenFailed(format!("{}: {}", parent.display(), e)))?;
        }

        let conn = Connection::open(path).map_err(RusqliteErrorExt::into_storage_error)?;
        let store = Self { conn };
        store.init_schema()?;
        tracing::debug!("Opened settings store at {}", path.display());
        Ok(store)
    }

    /// Create an in-memory store (nothing survives the process).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(RusqliteErrorExt::into_storage_error)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS settings (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
                "#,
            )
            .map_err(RusqliteErrorExt::into_storage_error)
    }
}

impl SettingsStore for SqliteSettingsStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(RusqliteErrorExt::into_storage_error)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn
            .execute(
                "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )
            .map_err(RusqliteErrorExt::into_storage_error)?;
        Ok(())
    }
}

/// In-memory store that refuses writes to one key.
#[cfg(test)]
pub(crate) struct RejectingStore {
    inner: SqliteSettingsStore,
    rejected_key: &'static str,
}

#[cfg(test)]
impl RejectingStore {
    pub(crate) fn new(rejected_key: &'static str) -> Self {
        Self {
            inner: SqliteSettingsStore::in_memory().unwrap(),
            rejected_key,
        }
    }
}

#[cfg(test)]
impl SettingsStore for RejectingStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if key == self.rejected_key {
            return Err(StorageError::QueryFailed("database is locked".to_string()));
        }
        self.inner.set(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing_key() {
        let store = SqliteSettingsStore::in_memory().unwrap();
        assert_eq!(store.get("COLOR_THEME").unwrap(), None);
    }

    #[test]
    fn test_set_then_overwrite() {
        let store = SqliteSettingsStore::in_memory().unwrap();
        store.set("COLOR_THEME", "dark").unwrap();
        store.set("COLOR_THEME", "light").unwrap();

        assert_eq!(store.get("COLOR_THEME").unwrap().as_deref(), Some("light"));
    }

    #[test]
    fn test_empty_string_is_a_value() {
        let store = SqliteSettingsStore::in_memory().unwrap();
        store.set("WEATHER_LOCATION_CONFIG", "").unwrap();
        assert_eq!(store.get("WEATHER_LOCATION_CONFIG").unwrap().as_deref(), Some(""));
    }

    #[test]
    fn test_rejecting_store_fails_only_its_key() {
        let store = RejectingStore::new("COLOR_THEME");
        assert!(store.set("COLOR_THEME", "light").is_err());
        store.set("STEP_GOAL", "500").unwrap();
        assert_eq!(store.get("STEP_GOAL").unwrap().as_deref(), Some("500"));
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("settings.db");

        {
            let store = SqliteSettingsStore::open(&path).unwrap();
            store.set("STEP_GOAL", "12345").unwrap();
        }

        let store = SqliteSettingsStore::open(&path).unwrap();
        assert_eq!(store.get("STEP_GOAL").unwrap().as_deref(), Some("12345"));
    }
}
