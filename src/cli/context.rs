//! Wiring shared by every command: config, cache, backend and connectivity

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use miette::{IntoDiagnostic, Result, WrapErr};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{
    Config, ConnectivityMonitor, ConnectivityProbe, HttpProbe, InstallationCache, RemoteGateway,
    RestGateway, SearchCoordinator, SyncOrchestrator, UnconfiguredGateway,
};

/// How long the startup reachability check may take
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything a command needs, built once per invocation
pub struct AppContext {
    pub config: Config,
    pub cache_path: PathBuf,
    pub cache: Arc<InstallationCache>,
    pub gateway: Arc<dyn RemoteGateway>,
    pub connectivity: ConnectivityMonitor,
    /// `--format`, else `default_format` from the config file, else auto
    pub format: OutputFormat,
}

/// Pick the output format; an explicit flag beats the config file
pub fn resolve_format(flag: Option<OutputFormat>, config: &Config) -> Result<OutputFormat> {
    if let Some(format) = flag {
        return Ok(format);
    }
    match config.default_format.as_deref() {
        Some(name) => <OutputFormat as ValueEnum>::from_str(name.trim(), true)
            .map_err(|e| miette::miette!("Invalid default_format in config: {}", e)),
        None => Ok(OutputFormat::default()),
    }
}

impl AppContext {
    /// Load config, open the cache and determine connectivity
    ///
    /// The backend counts as reachable only when it is configured, `--offline`
    /// was not given, and a probe request gets any answer.
    pub async fn open(global: &GlobalOpts) -> Result<Self> {
        Self::build(global, !global.offline).await
    }

    /// Like [`AppContext::open`] but never touches the network
    pub async fn open_local(global: &GlobalOpts) -> Result<Self> {
        Self::build(global, false).await
    }

    async fn build(global: &GlobalOpts, probe: bool) -> Result<Self> {
        let mut config = Config::load();
        if let Some(ref path) = global.cache {
            config.cache_path = Some(path.clone());
        }
        let format = resolve_format(global.format, &config)?;

        let cache_path = config.cache_path();
        let cache = InstallationCache::open(&cache_path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to open cache at {}", cache_path.display()))?;

        let rest = config.rest_config();
        let gateway: Arc<dyn RemoteGateway> = match rest {
            Some(ref rest) => Arc::new(RestGateway::new(rest).into_diagnostic()?),
            None => {
                tracing::debug!("no backend configured, using cache only");
                Arc::new(UnconfiguredGateway)
            }
        };

        let online = match rest {
            _ if !probe => false,
            Some(ref rest) => {
                let probe = HttpProbe::new(rest.base_url.clone(), PROBE_TIMEOUT).into_diagnostic()?;
                probe.check().await
            }
            None => false,
        };
        tracing::debug!(online, "initial connectivity");

        Ok(Self {
            config,
            cache_path,
            cache: Arc::new(cache),
            gateway,
            connectivity: ConnectivityMonitor::new(online),
            format,
        })
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    pub fn search_coordinator(&self) -> SearchCoordinator {
        SearchCoordinator::new(
            Arc::clone(&self.gateway),
            Arc::clone(&self.cache),
            self.connectivity.clone(),
            self.config.search_settings(),
        )
    }

    pub fn sync_orchestrator(&self) -> SyncOrchestrator {
        SyncOrchestrator::new(
            Arc::clone(&self.gateway),
            Arc::clone(&self.cache),
            self.connectivity.clone(),
            self.config.sync_settings(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_flag_wins() {
        let config = Config::from_yaml("default_format: json\n").unwrap();
        assert_eq!(
            resolve_format(Some(OutputFormat::Tsv), &config).unwrap(),
            OutputFormat::Tsv
        );
    }

    #[test]
    fn test_format_from_config() {
        let config = Config::from_yaml("default_format: CSV\n").unwrap();
        assert_eq!(resolve_format(None, &config).unwrap(), OutputFormat::Csv);
        assert_eq!(
            resolve_format(None, &Config::default()).unwrap(),
            OutputFormat::Auto
        );
    }

    #[test]
    fn test_unknown_config_format_rejected() {
        let config = Config::from_yaml("default_format: xml\n").unwrap();
        assert!(resolve_format(None, &config).is_err());
    }
}
