use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{Result, StoreError};

pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    conn.pragma_update(None, "wal_autocheckpoint", 100)?;

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS prefs (
            key        TEXT PRIMARY KEY,
            value      TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;

    let version: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    match version.as_deref().map(str::parse::<i64>) {
        None => {
            conn.execute(
                "INSERT INTO metadata (key, value) VALUES ('schema_version', ?1)",
                params![SCHEMA_VERSION.to_string()],
            )?;
            tracing::debug!("initialized prefs schema v{SCHEMA_VERSION}");
        }
        Some(Ok(v)) if v > SCHEMA_VERSION => {
            return Err(StoreError::InvalidData(format!(
                "database schema v{v} is newer than supported v{SCHEMA_VERSION}"
            )));
        }
        Some(Ok(_)) => {}
        Some(Err(_)) => {
            return Err(StoreError::InvalidData(
                "unreadable schema_version in metadata".to_string(),
            ));
        }
    }

    Ok(())
}
