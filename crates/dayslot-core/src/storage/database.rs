//! SQLite-backed key-value store for application state.
//!
//! Holds:
//! - The item collection (one JSON document under [`ITEMS_KEY`])
//! - The start of the last rolled-over window
//! - One-time prompt flags

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use super::data_dir;
use crate::error::{CoreError, DatabaseError, Result};
use crate::item::{Item, ItemPersistence};

/// Key of the serialized item list.
pub const ITEMS_KEY: &str = "items";
/// Key of the last handled rollover window start.
pub const LAST_ROLLOVER_KEY: &str = "rollover.last_window_start";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Key of the "prompt already shown" flag for a source.
pub fn prompt_key(source: &str) -> String {
    format!("prompt.{source}.shown")
}

/// SQLite database holding the kv table. Clones share one connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Open the database at `~/.config/dayslot/dayslot.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("dayslot.db");
        Self::open_at(&path)
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CoreError::Database(DatabaseError::Locked))
    }

    fn migrate(&self) -> Result<()> {
        self.conn()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Read a timestamp written by [`Database::kv_set_timestamp`].
    /// Unparseable values read as absent.
    pub fn kv_get_timestamp(&self, key: &str) -> Result<Option<NaiveDateTime>> {
        Ok(self
            .kv_get(key)?
            .and_then(|v| NaiveDateTime::parse_from_str(&v, TIMESTAMP_FORMAT).ok()))
    }

    pub fn kv_set_timestamp(&self, key: &str, value: NaiveDateTime) -> Result<()> {
        self.kv_set(key, &value.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn kv_flag(&self, key: &str) -> Result<bool> {
        Ok(self.kv_get(key)?.as_deref() == Some("true"))
    }
}

impl ItemPersistence for Database {
    fn load_all(&self) -> Result<Vec<Item>> {
        match self.kv_get(ITEMS_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn save_all(&self, items: &[Item]) -> Result<()> {
        let json = serde_json::to_string(items)?;
        self.kv_set(ITEMS_KEY, &json)
    }
}
