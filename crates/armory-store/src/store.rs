use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use armory_core::{KeyValueStore, PersistenceError};

use crate::error::Result;
use crate::schema;

pub const DB_FILE: &str = "prefs.db";

/// SQLite-backed string preferences.
///
/// Writes are staged in memory and only hit the database on [`flush`],
/// which commits every staged change in one transaction. Reads see staged
/// values first. Anything still staged on drop is flushed.
///
/// [`flush`]: PrefsStore::flush
pub struct PrefsStore {
    conn: Connection,
    /// `None` marks a staged removal.
    staged: BTreeMap<String, Option<String>>,
}

impl PrefsStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn,
            staged: BTreeMap::new(),
        })
    }

    /// Open `<dir>/prefs.db`, creating the directory if needed.
    pub fn open_in_dir(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Self::open(&dir.join(DB_FILE))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn,
            staged: BTreeMap::new(),
        })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // --- Metadata ---

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM metadata WHERE key = ?1")?;
        Ok(stmt.query_row([key], |row| row.get(0)).optional()?)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    // --- Prefs ---

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        if let Some(staged) = self.staged.get(key) {
            return Ok(staged.clone());
        }
        let mut stmt = self.conn.prepare("SELECT value FROM prefs WHERE key = ?1")?;
        Ok(stmt.query_row([key], |row| row.get(0)).optional()?)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.staged.insert(key.to_string(), Some(value.to_string()));
    }

    pub fn remove(&mut self, key: &str) {
        self.staged.insert(key.to_string(), None);
    }

    /// Number of staged, unflushed changes.
    pub fn pending(&self) -> usize {
        self.staged.len()
    }

    /// Commit every staged change. Returns how many were written.
    pub fn flush(&mut self) -> Result<usize> {
        if self.staged.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.unchecked_transaction()?;
        for (key, value) in &self.staged {
            match value {
                Some(v) => {
                    tx.execute(
                        "INSERT INTO prefs (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
                         ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                        updated_at = excluded.updated_at",
                        params![key, v],
                    )?;
                }
                None => {
                    tx.execute("DELETE FROM prefs WHERE key = ?1", [key])?;
                }
            }
        }
        tx.commit()?;

        let written = self.staged.len();
        self.staged.clear();
        tracing::debug!("flushed {written} prefs");
        Ok(written)
    }

    /// Every key with a value, staged changes included, sorted.
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT key FROM prefs ORDER BY key")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut keys = Vec::new();
        for key in rows {
            let key = key?;
            if !self.staged.contains_key(&key) {
                keys.push(key);
            }
        }
        keys.extend(
            self.staged
                .iter()
                .filter(|(_, v)| v.is_some())
                .map(|(k, _)| k.clone()),
        );
        keys.sort();
        Ok(keys)
    }
}

impl Drop for PrefsStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!("failed to flush prefs on close: {e}");
        }
    }
}

impl KeyValueStore for PrefsStore {
    fn get_string(&self, key: &str) -> std::result::Result<Option<String>, PersistenceError> {
        Ok(self.get(key)?)
    }

    fn set_string(&mut self, key: &str, value: &str) -> std::result::Result<(), PersistenceError> {
        self.set(key, value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> std::result::Result<(), PersistenceError> {
        PrefsStore::remove(self, key);
        Ok(())
    }

    fn flush(&mut self) -> std::result::Result<(), PersistenceError> {
        PrefsStore::flush(self)?;
        Ok(())
    }
}
