//! SQLite-backed installation cache for offline lookups
//!
//! This module provides a local SQLite cache that:
//! - Holds the full installation record set from the last successful sync
//! - Tracks when that sync happened and how many records it wrote
//! - Answers point lookups and accent-insensitive searches while offline
//!
//! The cache is derived data. It is only ever written by a full sync
//! ("clear then repopulate") and can be deleted at any time.

mod queries;
mod schema;
mod types;

pub use types::*;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use thiserror::Error;

use crate::core::installation::InvalidRecord;

/// Default cache file name inside the data directory
pub const CACHE_FILE: &str = "cache.db";

/// Current schema version - tables are recreated on version mismatch
const SCHEMA_VERSION: i32 = 1;

/// Errors raised by the local store
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("cache directory error: {0}")]
    Io(#[from] std::io::Error),

    #[error("refusing to cache invalid record: {0}")]
    InvalidRecord(#[from] InvalidRecord),

    #[error("cache connection is unusable after a panic in another task")]
    Poisoned,
}

/// The installation cache backed by SQLite
///
/// A single connection is shared behind a mutex. Every operation holds the
/// lock for its whole duration, so a reader never observes the inside of a
/// `put_all` transaction.
pub struct InstallationCache {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl InstallationCache {
    /// Open or create the cache at `path`
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        let cache = Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        };
        cache.prepare_schema()?;
        Ok(cache)
    }

    /// Open a throwaway cache that lives only as long as this value
    pub fn open_in_memory() -> Result<Self, CacheError> {
        let cache = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            path: None,
        };
        cache.prepare_schema()?;
        Ok(cache)
    }

    /// Location of the database file (`None` for in-memory caches)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Create tables, or recreate them if they were written by another schema version
    fn prepare_schema(&self) -> Result<(), CacheError> {
        let mut conn = self.lock()?;
        if schema::needs_rebuild(&conn)? {
            tracing::debug!("cache schema missing or outdated, recreating tables");
            schema::drop_all(&conn)?;
        }
        schema::init(&mut conn)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn.lock().map_err(|_| CacheError::Poisoned)
    }
}
