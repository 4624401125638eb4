//! Database schema initialization

use rusqlite::{params, Connection, OptionalExtension};

use super::{CacheError, SCHEMA_VERSION};

/// Check if the stored schema version differs from the current one
pub(super) fn needs_rebuild(conn: &Connection) -> Result<bool, CacheError> {
    let has_version_table: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
        [],
        |row| row.get(0),
    )?;

    if !has_version_table {
        // Fresh file, or a file from before versioning: either way start clean
        return Ok(true);
    }

    let current_version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?;

    Ok(current_version != Some(SCHEMA_VERSION))
}

/// Drop every table (keeping the database file)
pub(super) fn drop_all(conn: &Connection) -> Result<(), CacheError> {
    conn.execute_batch(
        r#"
        DROP TABLE IF EXISTS schema_version;
        DROP TABLE IF EXISTS installations;
        DROP TABLE IF EXISTS sync_metadata;
        "#,
    )?;
    Ok(())
}

/// Initialize database schema
pub(super) fn init(conn: &mut Connection) -> Result<(), CacheError> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        -- Installation records, insertion order preserved by rowid
        CREATE TABLE IF NOT EXISTS installations (
            id TEXT PRIMARY KEY,
            installation_number TEXT NOT NULL,
            name TEXT NOT NULL,
            address TEXT NOT NULL,
            street TEXT NOT NULL,
            client_lat REAL,
            client_lng REAL,
            pee_lat REAL NOT NULL,
            pee_lng REAL NOT NULL,
            created_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_installations_number ON installations(installation_number);
        CREATE INDEX IF NOT EXISTS idx_installations_name ON installations(name);

        -- Sync metadata (single 'last_sync' row)
        CREATE TABLE IF NOT EXISTS sync_metadata (
            key TEXT PRIMARY KEY,
            timestamp INTEGER NOT NULL,
            count INTEGER NOT NULL
        );
        "#,
    )?;

    tx.execute("DELETE FROM schema_version", [])?;
    tx.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        params![SCHEMA_VERSION],
    )?;
    tx.commit()?;

    Ok(())
}
