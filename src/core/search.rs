//! Search routing: remote first when online, local cache otherwise

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::cache::{CacheError, InstallationCache};
use crate::core::connectivity::ConnectivityMonitor;
use crate::core::gateway::RemoteGateway;
use crate::core::installation::Installation;

/// Which field a query is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
    /// Installation number
    #[default]
    #[value(name = "number", alias = "installation")]
    InstallationNumber,
    /// Installation / customer name
    Name,
    /// Address (street when the address line is empty)
    Address,
}

impl SearchField {
    /// Backend column holding this field
    pub fn column(&self) -> &'static str {
        match self {
            SearchField::InstallationNumber => "installation_number",
            SearchField::Name => "name",
            SearchField::Address => "address",
        }
    }
}

impl fmt::Display for SearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchField::InstallationNumber => write!(f, "number"),
            SearchField::Name => write!(f, "name"),
            SearchField::Address => write!(f, "address"),
        }
    }
}

/// Search limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSettings {
    /// Queries shorter than this (in characters) return nothing
    pub min_query_len: usize,
    /// Maximum results per query
    pub result_limit: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            min_query_len: 2,
            result_limit: 100,
        }
    }
}

/// Raised when no search path produced an answer
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SearchError {
    message: String,
    #[source]
    source: CacheError,
}

impl SearchError {
    fn cache_unavailable(source: CacheError) -> Self {
        Self {
            message: format!("offline search unavailable: {source}"),
            source,
        }
    }

    /// Human-readable description for display
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Try `primary`; if it fails, log and run `secondary`
///
/// Only the secondary's error can escape.
pub async fn with_fallback<T, E1, E2, P, S, SF>(label: &str, primary: P, secondary: S) -> Result<T, E2>
where
    E1: fmt::Display,
    P: Future<Output = Result<T, E1>>,
    S: FnOnce() -> SF,
    SF: Future<Output = Result<T, E2>>,
{
    match primary.await {
        Ok(value) => Ok(value),
        Err(e) => {
            tracing::warn!(error = %e, "{label}: primary path failed, falling back");
            secondary().await
        }
    }
}

/// Chooses between the remote backend and the local cache
pub struct SearchCoordinator {
    gateway: Arc<dyn RemoteGateway>,
    cache: Arc<InstallationCache>,
    connectivity: ConnectivityMonitor,
    settings: SearchSettings,
}

impl SearchCoordinator {
    pub fn new(
        gateway: Arc<dyn RemoteGateway>,
        cache: Arc<InstallationCache>,
        connectivity: ConnectivityMonitor,
        settings: SearchSettings,
    ) -> Self {
        Self {
            gateway,
            cache,
            connectivity,
            settings,
        }
    }

    pub fn settings(&self) -> SearchSettings {
        self.settings
    }

    /// Run a query against the best available source
    pub async fn search(
        &self,
        query: &str,
        field: SearchField,
    ) -> Result<Vec<Installation>, SearchError> {
        if query.chars().count() < self.settings.min_query_len {
            return Ok(Vec::new());
        }

        let limit = self.settings.result_limit;

        if !self.connectivity.is_online() {
            tracing::debug!(query, %field, "offline, searching cache");
            return self.search_cache(query, field);
        }

        with_fallback(
            "search",
            async {
                let mut found = self.gateway.search(query, field, limit).await?;
                found.truncate(limit);
                Ok::<_, crate::core::gateway::RemoteError>(found)
            },
            || async { self.search_cache(query, field) },
        )
        .await
    }

    /// Search the local cache only
    pub fn search_cache(
        &self,
        query: &str,
        field: SearchField,
    ) -> Result<Vec<Installation>, SearchError> {
        self.cache
            .search(query, field, self.settings.result_limit)
            .map_err(SearchError::cache_unavailable)
    }

    /// Look up one installation: cache first, then the backend when online
    pub async fn find_by_number(&self, number: &str) -> Result<Option<Installation>, SearchError> {
        let cache_failure = match self.cache.find_by_number(number) {
            Ok(Some(found)) => return Ok(Some(found)),
            Ok(None) => None,
            Err(e) => Some(e),
        };

        let miss = |failure: Option<CacheError>| match failure {
            Some(e) => Err(SearchError::cache_unavailable(e)),
            None => Ok(None),
        };

        if !self.connectivity.is_online() {
            return miss(cache_failure);
        }
        if let Some(e) = &cache_failure {
            tracing::warn!(error = %e, "cache lookup failed, asking backend");
        }

        match self.gateway.find_by_number(number).await {
            Ok(found) => Ok(found),
            Err(remote) => {
                tracing::warn!(error = %remote, "remote lookup failed");
                miss(cache_failure)
            }
        }
    }
}
