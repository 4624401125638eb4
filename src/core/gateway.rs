//! Remote data gateway
//!
//! The remote backend is a PostgREST endpoint (the Supabase REST surface)
//! exposing one table of installations. The core only needs three reads
//! from it: an ordered page of the full table, a filtered search, and an
//! exact lookup by installation number. Authentication is handled outside
//! the core; the gateway is handed a ready-to-use API key.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde_json::Value;
use thiserror::Error;

use crate::core::installation::Installation;
use crate::core::search::SearchField;

/// Errors that can occur talking to the remote backend
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode remote response: {message}")]
    Decode { message: String },

    #[error("no remote backend configured (set GEORESCUE_URL and GEORESCUE_API_KEY)")]
    NotConfigured,
}

/// One page of the full scan
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Rows the backend returned, including rejected ones
    pub rows: usize,
    /// Rows that passed validation
    pub records: Vec<Installation>,
}

/// Read surface of the remote backend
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Fetch `limit` rows starting at `offset`, ordered by installation number
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<Page, RemoteError>;

    /// Case-insensitive substring match on one column, at most `limit` rows
    async fn search(
        &self,
        query: &str,
        field: SearchField,
        limit: usize,
    ) -> Result<Vec<Installation>, RemoteError>;

    /// Exact lookup by installation number
    async fn find_by_number(&self, number: &str) -> Result<Option<Installation>, RemoteError>;
}

/// Download the whole remote table
///
/// Pages are requested from offset 0 until one comes back with fewer rows
/// than `page_size`. `on_progress` receives the accumulated record count
/// after every page. Records repeated across pages (rows shifting while
/// paging) are kept once. The result is ordered by installation number.
/// Any failed page fails the whole fetch.
pub async fn fetch_all<G, F>(
    gateway: &G,
    page_size: usize,
    mut on_progress: F,
) -> Result<Vec<Installation>, RemoteError>
where
    G: RemoteGateway + ?Sized,
    F: FnMut(usize),
{
    let page_size = page_size.max(1);
    let mut all: Vec<Installation> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut offset = 0usize;
    let mut pages = 0usize;

    loop {
        let page = gateway.fetch_page(offset, page_size).await?;
        pages += 1;

        for record in page.records {
            if seen.insert(record.id.clone()) {
                all.push(record);
            }
        }
        on_progress(all.len());
        // Let progress observers run on a single-threaded runtime
        tokio::task::yield_now().await;

        tracing::debug!(page = pages, offset, rows = page.rows, total = all.len(), "fetched page");

        if page.rows < page_size {
            break;
        }
        offset += page.rows;
    }

    all.sort_by(|a, b| a.installation_number.cmp(&b.installation_number));
    tracing::debug!(pages, records = all.len(), "remote scan complete");
    Ok(all)
}

/// Gateway used when no backend is configured; every call fails
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredGateway;

#[async_trait]
impl RemoteGateway for UnconfiguredGateway {
    async fn fetch_page(&self, _offset: usize, _limit: usize) -> Result<Page, RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn search(
        &self,
        _query: &str,
        _field: SearchField,
        _limit: usize,
    ) -> Result<Vec<Installation>, RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn find_by_number(&self, _number: &str) -> Result<Option<Installation>, RemoteError> {
        Err(RemoteError::NotConfigured)
    }
}

/// Connection settings for [`RestGateway`]
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub base_url: String,
    /// Anonymous or service API key
    pub api_key: String,
    /// Table holding the installations
    pub table: String,
    /// Per-request timeout
    pub timeout: Duration,
}

/// PostgREST-backed gateway
pub struct RestGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl RestGateway {
    /// Build a gateway with auth headers baked into the client
    pub fn new(config: &RestConfig) -> Result<Self, RemoteError> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(&config.api_key)?);
        headers.insert(
            AUTHORIZATION,
            header_value(&format!("Bearer {}", config.api_key))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .user_agent(concat!("georescue/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/rest/v1/{}",
                config.base_url.trim_end_matches('/'),
                config.table
            ),
        })
    }

    /// Run a GET against the table and return the decoded rows
    async fn get_rows(&self, query: &[(&str, String)]) -> Result<Page, RemoteError> {
        let response = self.client.get(&self.endpoint).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let rows: Vec<Value> = response.json().await.map_err(|e| RemoteError::Decode {
            message: e.to_string(),
        })?;
        Ok(decode_rows(rows))
    }
}

#[async_trait]
impl RemoteGateway for RestGateway {
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<Page, RemoteError> {
        self.get_rows(&[
            ("select", "*".to_string()),
            ("order", "installation_number.asc".to_string()),
            ("offset", offset.to_string()),
            ("limit", limit.to_string()),
        ])
        .await
    }

    async fn search(
        &self,
        query: &str,
        field: SearchField,
        limit: usize,
    ) -> Result<Vec<Installation>, RemoteError> {
        let page = self
            .get_rows(&[
                ("select", "*".to_string()),
                (field.column(), format!("ilike.*{}*", ilike_pattern(query))),
                ("limit", limit.to_string()),
            ])
            .await?;
        Ok(page.records)
    }

    async fn find_by_number(&self, number: &str) -> Result<Option<Installation>, RemoteError> {
        let page = self
            .get_rows(&[
                ("select", "*".to_string()),
                ("installation_number", format!("eq.{number}")),
                ("limit", "1".to_string()),
            ])
            .await?;
        Ok(page.records.into_iter().next())
    }
}

fn header_value(s: &str) -> Result<HeaderValue, RemoteError> {
    HeaderValue::from_str(s).map_err(|e| RemoteError::Decode {
        message: format!("invalid header value: {e}"),
    })
}

/// Escape user text for use inside a PostgREST `ilike` filter
///
/// `%`, `_` and `\` are LIKE metacharacters and get backslash-escaped.
/// `*` is PostgREST's URL-safe wildcard and cannot be escaped, so it is
/// dropped.
pub fn ilike_pattern(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    for c in query.chars() {
        match c {
            '%' | '_' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '*' => {}
            _ => out.push(c),
        }
    }
    out
}

/// Decode raw rows, dropping the ones that are not valid installations
fn decode_rows(rows: Vec<Value>) -> Page {
    let total = rows.len();
    let mut records = Vec::with_capacity(total);

    for row in rows {
        let id = row.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<Installation>(row) {
            Ok(inst) => match inst.validate() {
                Ok(()) => records.push(inst),
                Err(e) => tracing::warn!(%e, "skipping remote row"),
            },
            Err(e) => tracing::warn!(%id, error = %e, "skipping undecodable remote row"),
        }
    }

    Page {
        rows: total,
        records,
    }
}
