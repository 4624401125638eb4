//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use georescue::core::text::{contains_normalized, normalize};
use georescue::core::{
    Installation, InstallationCache, Page, RemoteError, RemoteGateway, SearchField, SyncMetadata,
};

/// Build a valid installation
pub fn installation(id: &str, number: &str, name: &str, address: &str) -> Installation {
    Installation {
        id: id.to_string(),
        installation_number: number.to_string(),
        name: name.to_string(),
        address: address.to_string(),
        street: String::new(),
        client_lat: None,
        client_lng: None,
        pee_lat: -23.55,
        pee_lng: -46.63,
        created_at: None,
    }
}

/// `count` distinct installations ordered by number
pub fn generate(count: usize) -> Vec<Installation> {
    (0..count)
        .map(|i| {
            installation(
                &format!("id-{i:05}"),
                &format!("{i:06}"),
                &format!("Customer {i}"),
                &format!("Rua {i}"),
            )
        })
        .collect()
}

/// A small, human-looking record set
pub fn sample_set() -> Vec<Installation> {
    vec![
        installation("a1", "100200", "Jose Silva", "Rua das Flores, 10"),
        installation("a2", "100201", "Maria Souza", "Avenida Brasil, 200"),
        installation("a3", "300400", "João Pereira", "Rua Direita, 5"),
    ]
}

/// Seed a cache as if a sync had run at `synced_at`
pub fn seed_cache(cache: &InstallationCache, records: &[Installation], synced_at: DateTime<Utc>) {
    let count = cache.put_all(records).unwrap();
    cache
        .record_sync(&SyncMetadata {
            timestamp: synced_at,
            count,
        })
        .unwrap();
}

/// Seed a cache file on disk
pub fn seed_cache_file(path: &Path, records: &[Installation]) {
    let cache = InstallationCache::open(path).unwrap();
    seed_cache(&cache, records, Utc::now());
}

/// Damage a cache file through a second connection
pub fn break_cache(path: &Path, sql: &str) {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute_batch(sql).unwrap();
}

/// In-memory backend with call counters and injectable failures
#[derive(Default)]
pub struct FakeGateway {
    records: Vec<Installation>,
    fail_page: Option<usize>,
    fail_search: bool,
    page_delay: Option<Duration>,
    search_delay: Option<Duration>,
    pub page_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
    pub lookup_calls: AtomicUsize,
}

impl FakeGateway {
    pub fn new(records: Vec<Installation>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    /// The `index`th page request (0-based) fails
    pub fn failing_page(mut self, index: usize) -> Self {
        self.fail_page = Some(index);
        self
    }

    pub fn failing_search(mut self) -> Self {
        self.fail_search = true;
        self
    }

    pub fn page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = Some(delay);
        self
    }

    pub fn search_delay(mut self, delay: Duration) -> Self {
        self.search_delay = Some(delay);
        self
    }

    pub fn pages(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    pub fn searches(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn lookups(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    fn unavailable() -> RemoteError {
        RemoteError::Status {
            status: 503,
            body: "unavailable".to_string(),
        }
    }
}

#[async_trait]
impl RemoteGateway for FakeGateway {
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<Page, RemoteError> {
        let call = self.page_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.page_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_page == Some(call) {
            return Err(Self::unavailable());
        }

        let start = offset.min(self.records.len());
        let end = (offset + limit).min(self.records.len());
        let records = self.records[start..end].to_vec();
        Ok(Page {
            rows: records.len(),
            records,
        })
    }

    async fn search(
        &self,
        query: &str,
        field: SearchField,
        limit: usize,
    ) -> Result<Vec<Installation>, RemoteError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.search_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_search {
            return Err(Self::unavailable());
        }

        let needle = normalize(query);
        Ok(self
            .records
            .iter()
            .filter(|r| {
                let value = match field {
                    SearchField::InstallationNumber => &r.installation_number,
                    SearchField::Name => &r.name,
                    SearchField::Address => &r.address,
                };
                contains_normalized(value, &needle)
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_by_number(&self, number: &str) -> Result<Option<Installation>, RemoteError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .records
            .iter()
            .find(|r| r.installation_number == number)
            .cloned())
    }
}
