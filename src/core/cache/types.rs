//! Cache type definitions

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Metadata key under which the last successful sync is stored
pub const LAST_SYNC_KEY: &str = "last_sync";

/// Record of the last successful full sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncMetadata {
    /// When the sync finished writing
    pub timestamp: DateTime<Utc>,
    /// Number of records that sync wrote
    pub count: usize,
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Live number of stored records
    pub count: usize,
    /// Completion time of the last successful sync, if any
    pub last_sync: Option<DateTime<Utc>>,
    /// Records written by the last successful sync (0 if never synced)
    pub last_sync_count: usize,
}

impl CacheStats {
    /// Age of the cached data relative to `now`
    pub fn age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.last_sync.map(|ts| now - ts)
    }
}
