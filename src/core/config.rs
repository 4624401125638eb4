//! Configuration management with layered hierarchy

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::cache::CACHE_FILE;
use crate::core::gateway::RestConfig;
use crate::core::search::SearchSettings;
use crate::core::sync::SyncSettings;

/// Table holding the installations on the backend
pub const DEFAULT_TABLE: &str = "electrical_installations";

/// GeoRescue configuration with layered hierarchy
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend project URL
    pub url: Option<String>,

    /// Backend API key
    pub api_key: Option<String>,

    /// Backend table name
    pub table: Option<String>,

    /// Cache database location
    pub cache_path: Option<PathBuf>,

    /// Default output format
    pub default_format: Option<String>,

    /// Records per page during sync
    pub page_size: Option<usize>,

    /// Estimated remote record count (progress scaling only)
    pub expected_total: Option<usize>,

    /// Hours before the cache counts as stale
    pub staleness_hours: Option<u64>,

    /// Quiet period for search-as-you-type, in milliseconds
    pub debounce_ms: Option<u64>,

    /// Maximum results per search
    pub result_limit: Option<usize>,

    /// Minimum query length in characters
    pub min_query_len: Option<usize>,

    /// Timeout for backend requests, in seconds
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load() -> Self {
        let mut config = Config::default();

        // 1. Built-in defaults (applied by the accessors)

        // 2. Config file (GEORESCUE_CONFIG or ~/.config/georescue/config.yaml)
        if let Some(path) = Self::config_path() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(contents) => match serde_yml::from_str::<Config>(&contents) {
                        Ok(file) => config.merge(file),
                        Err(e) => {
                            tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config file")
                        }
                    },
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "could not read config file")
                    }
                }
            }
        }

        // 3. Environment variables
        if let Ok(url) = std::env::var("GEORESCUE_URL") {
            config.url = Some(url);
        }
        if let Ok(key) = std::env::var("GEORESCUE_API_KEY") {
            config.api_key = Some(key);
        }
        if let Ok(cache) = std::env::var("GEORESCUE_CACHE") {
            config.cache_path = Some(PathBuf::from(cache));
        }

        config
    }

    /// Parse a configuration document
    pub fn from_yaml(contents: &str) -> Result<Self, serde_yml::Error> {
        serde_yml::from_str(contents)
    }

    /// Get the path to the config file
    pub fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("GEORESCUE_CONFIG") {
            return Some(PathBuf::from(path));
        }
        directories::ProjectDirs::from("", "", "georescue")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: Config) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field;
                })*
            };
        }
        take!(
            url,
            api_key,
            table,
            cache_path,
            default_format,
            page_size,
            expected_total,
            staleness_hours,
            debounce_ms,
            result_limit,
            min_query_len,
            timeout_secs
        );
    }

    /// Cache database location, falling back to the platform data dir
    pub fn cache_path(&self) -> PathBuf {
        if let Some(ref path) = self.cache_path {
            return path.clone();
        }
        directories::ProjectDirs::from("", "", "georescue")
            .map(|dirs| dirs.data_dir().join(CACHE_FILE))
            .unwrap_or_else(|| PathBuf::from(".georescue").join(CACHE_FILE))
    }

    /// Backend connection settings, if both URL and key are set
    pub fn rest_config(&self) -> Option<RestConfig> {
        let base_url = self.url.clone().filter(|u| !u.trim().is_empty())?;
        let api_key = self.api_key.clone().filter(|k| !k.trim().is_empty())?;
        Some(RestConfig {
            base_url,
            api_key,
            table: self
                .table
                .clone()
                .unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            timeout: self.timeout(),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(30))
    }

    pub fn sync_settings(&self) -> SyncSettings {
        let defaults = SyncSettings::default();
        SyncSettings {
            page_size: self.page_size.unwrap_or(defaults.page_size).max(1),
            expected_total: self.expected_total.unwrap_or(defaults.expected_total),
            staleness_threshold: self
                .staleness_hours
                .map(|h| Duration::from_secs(h * 60 * 60))
                .unwrap_or(defaults.staleness_threshold),
        }
    }

    pub fn search_settings(&self) -> SearchSettings {
        let defaults = SearchSettings::default();
        SearchSettings {
            min_query_len: self.min_query_len.unwrap_or(defaults.min_query_len),
            result_limit: self.result_limit.unwrap_or(defaults.result_limit),
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.unwrap_or(300))
    }
}
