//! Cache reads and the bulk replace
//!
//! All operations take the connection lock once, so each of them is atomic
//! with respect to the others.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{CacheError, CacheStats, InstallationCache, SyncMetadata, LAST_SYNC_KEY};
use crate::core::installation::Installation;
use crate::core::search::SearchField;
use crate::core::text::{contains_normalized, normalize};

const SELECT_COLUMNS: &str = r#"SELECT id, installation_number, name, address, street,
       client_lat, client_lng, pee_lat, pee_lng, created_at
FROM installations"#;

impl InstallationCache {
    /// Replace the entire record set
    ///
    /// Every record is validated before anything is touched. The delete and
    /// the inserts run in one transaction, so a failure leaves the previous
    /// set in place. Returns the number of records written.
    pub fn put_all(&self, records: &[Installation]) -> Result<usize, CacheError> {
        for record in records {
            record.validate()?;
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM installations", [])?;

        let mut written = 0usize;
        {
            let mut stmt = tx.prepare(
                r#"INSERT OR REPLACE INTO installations
                   (id, installation_number, name, address, street,
                    client_lat, client_lng, pee_lat, pee_lng, created_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
            )?;
            for r in records {
                written += stmt.execute(params![
                    r.id,
                    r.installation_number,
                    r.name,
                    r.address,
                    r.street,
                    r.client_lat,
                    r.client_lng,
                    r.pee_lat,
                    r.pee_lng,
                    r.created_at,
                ])?;
            }
        }

        // Duplicate ids collapse under INSERT OR REPLACE; report what is actually stored
        let stored: usize = tx.query_row("SELECT COUNT(*) FROM installations", [], |row| {
            row.get(0)
        })?;
        tx.commit()?;

        if stored != written {
            tracing::warn!(written, stored, "duplicate ids collapsed while caching");
        }
        Ok(stored)
    }

    /// Every cached record, in insertion order
    pub fn get_all(&self) -> Result<Vec<Installation>, CacheError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY rowid"))?;
        let records = stmt
            .query_map([], row_to_installation)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Exact lookup by installation number
    pub fn find_by_number(&self, number: &str) -> Result<Option<Installation>, CacheError> {
        let conn = self.lock()?;
        let found = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE installation_number = ?1 ORDER BY rowid LIMIT 1"),
                params![number],
                row_to_installation,
            )
            .optional()?;
        Ok(found)
    }

    /// Accent- and case-insensitive substring search on one field
    ///
    /// Results follow insertion order and stop at `limit`. For
    /// [`SearchField::Address`] the street is used when the address is empty.
    pub fn search(
        &self,
        query: &str,
        field: SearchField,
        limit: usize,
    ) -> Result<Vec<Installation>, CacheError> {
        let needle = normalize(query);
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY rowid"))?;
        let rows = stmt.query_map([], row_to_installation)?;

        let mut results = Vec::new();
        for row in rows {
            if results.len() >= limit {
                break;
            }
            let inst = row?;
            let candidate = match field {
                SearchField::InstallationNumber => inst.installation_number.as_str(),
                SearchField::Name => inst.name.as_str(),
                SearchField::Address => {
                    if inst.address.is_empty() {
                        inst.street.as_str()
                    } else {
                        inst.address.as_str()
                    }
                }
            };
            if contains_normalized(candidate, &needle) {
                results.push(inst);
            }
        }

        Ok(results)
    }

    /// Record count plus last-sync metadata
    pub fn get_stats(&self) -> Result<CacheStats, CacheError> {
        let count: usize = {
            let conn = self.lock()?;
            conn.query_row("SELECT COUNT(*) FROM installations", [], |row| row.get(0))?
        };
        let meta = self.sync_metadata()?;

        Ok(CacheStats {
            count,
            last_sync: meta.map(|m| m.timestamp),
            last_sync_count: meta.map(|m| m.count).unwrap_or(0),
        })
    }

    /// Last successful sync, if any
    pub fn sync_metadata(&self) -> Result<Option<SyncMetadata>, CacheError> {
        let conn = self.lock()?;
        let meta = conn
            .query_row(
                "SELECT timestamp, count FROM sync_metadata WHERE key = ?1",
                params![LAST_SYNC_KEY],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        Ok(meta.map(|(millis, count)| SyncMetadata {
            timestamp: from_millis(millis),
            count: count.max(0) as usize,
        }))
    }

    /// Stamp the last successful sync
    pub fn record_sync(&self, meta: &SyncMetadata) -> Result<(), CacheError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO sync_metadata (key, timestamp, count) VALUES (?1, ?2, ?3)",
            params![
                LAST_SYNC_KEY,
                meta.timestamp.timestamp_millis(),
                meta.count as i64
            ],
        )?;
        Ok(())
    }

    /// Clear records and metadata
    pub fn clear(&self) -> Result<(), CacheError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute_batch(
            r#"
            DELETE FROM installations;
            DELETE FROM sync_metadata;
            "#,
        )?;
        tx.commit()?;
        Ok(())
    }
}

fn row_to_installation(row: &Row<'_>) -> rusqlite::Result<Installation> {
    Ok(Installation {
        id: row.get(0)?,
        installation_number: row.get(1)?,
        name: row.get(2)?,
        address: row.get(3)?,
        street: row.get(4)?,
        client_lat: row.get(5)?,
        client_lng: row.get(6)?,
        pee_lat: row.get(7)?,
        pee_lng: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Convert epoch milliseconds to DateTime<Utc>
fn from_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
