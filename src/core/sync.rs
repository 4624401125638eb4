//! Full-refresh synchronization of the local cache
//!
//! A sync downloads the whole remote table, then swaps it into the cache in
//! one transaction and stamps the sync metadata. Anything that goes wrong
//! before the stamp leaves the previous metadata in place, so `last_sync`
//! always describes a complete cache.
//!
//! Progress is published through a `watch` channel: 0-80 while
//! downloading, 90 while writing, 100 when done.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;

use crate::core::cache::{CacheError, CacheStats, InstallationCache, SyncMetadata};
use crate::core::connectivity::{ConnectivityMonitor, Transition};
use crate::core::gateway::{fetch_all, RemoteError, RemoteGateway};

/// Share of the progress bar used by the download
const DOWNLOAD_SHARE: f64 = 80.0;
/// Progress shown while the cache is being written
const WRITE_PROGRESS: u8 = 90;

/// Errors that end a sync attempt
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no internet connection")]
    Offline,

    #[error("a sync is already running")]
    AlreadySyncing,

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Sync tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Records requested per page
    pub page_size: usize,
    /// Estimated remote record count, used only to scale progress
    pub expected_total: usize,
    /// Maximum cache age before an automatic sync
    pub staleness_threshold: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            page_size: 1000,
            expected_total: 21_510,
            staleness_threshold: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Lifecycle of the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    #[default]
    Idle,
    Syncing,
    Failed,
}

/// Snapshot published to observers
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncStatus {
    pub phase: SyncPhase,
    /// 0-100
    pub progress: u8,
    pub last_sync: Option<DateTime<Utc>>,
    pub total_records: usize,
    pub error: Option<String>,
}

impl SyncStatus {
    pub fn is_syncing(&self) -> bool {
        self.phase == SyncPhase::Syncing
    }
}

/// Outcome of a successful sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Records received from the backend
    pub fetched: usize,
    /// Records stored in the cache
    pub inserted: usize,
    pub synced_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// What `activate` decided
#[derive(Debug)]
pub enum AutoSync {
    /// No sync was attempted
    Skipped(SkipReason),
    Synced(SyncReport),
    Failed(SyncError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyActivated,
    Offline,
    Fresh,
}

/// Map downloaded records onto the 0-80 part of the progress scale
pub fn download_progress(count: usize, expected_total: usize) -> u8 {
    let expected = expected_total.max(1) as f64;
    let scaled = (count as f64 / expected * DOWNLOAD_SHARE).round();
    scaled.min(DOWNLOAD_SHARE) as u8
}

/// Staleness policy: sync when empty, never synced, or older than `threshold`
pub fn needs_sync(stats: &CacheStats, now: DateTime<Utc>, threshold: Duration) -> bool {
    let Some(last_sync) = stats.last_sync else {
        return true;
    };
    if stats.count == 0 {
        return true;
    }
    match (now - last_sync).to_std() {
        Ok(age) => age > threshold,
        // Last sync in the future: clock moved backwards, trust the data
        Err(_) => false,
    }
}

/// Resets the in-flight flag however the sync ends
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Coordinates full refreshes of the cache
pub struct SyncOrchestrator {
    gateway: Arc<dyn RemoteGateway>,
    cache: Arc<InstallationCache>,
    connectivity: ConnectivityMonitor,
    settings: SyncSettings,
    status: watch::Sender<SyncStatus>,
    in_flight: AtomicBool,
    activated: AtomicBool,
}

impl SyncOrchestrator {
    /// Create an orchestrator; the initial status is read from the cache
    pub fn new(
        gateway: Arc<dyn RemoteGateway>,
        cache: Arc<InstallationCache>,
        connectivity: ConnectivityMonitor,
        settings: SyncSettings,
    ) -> Self {
        let initial = match cache.get_stats() {
            Ok(stats) => SyncStatus {
                last_sync: stats.last_sync,
                total_records: stats.count,
                ..SyncStatus::default()
            },
            Err(e) => {
                tracing::warn!(error = %e, "could not read cache stats");
                SyncStatus {
                    error: Some(e.to_string()),
                    ..SyncStatus::default()
                }
            }
        };
        let (status, _) = watch::channel(initial);

        Self {
            gateway,
            cache,
            connectivity,
            settings,
            status,
            in_flight: AtomicBool::new(false),
            activated: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> SyncSettings {
        self.settings
    }

    /// Current status snapshot
    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    /// Observe status changes (last value wins)
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Replace the cache with the current remote data
    ///
    /// Fails immediately when offline or when another sync is running.
    /// Failures are also recorded in the published status.
    pub async fn sync(&self) -> Result<SyncReport, SyncError> {
        if !self.connectivity.is_online() {
            let err = SyncError::Offline;
            self.status.send_modify(|s| s.error = Some(err.to_string()));
            return Err(err);
        }

        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            tracing::debug!("sync requested while one is running, rejecting");
            return Err(SyncError::AlreadySyncing);
        };

        self.status.send_modify(|s| {
            s.phase = SyncPhase::Syncing;
            s.progress = 0;
            s.error = None;
        });

        match self.run().await {
            Ok(report) => {
                tracing::info!(
                    fetched = report.fetched,
                    inserted = report.inserted,
                    duration_ms = report.duration_ms,
                    "sync complete"
                );
                self.status.send_modify(|s| {
                    s.phase = SyncPhase::Idle;
                    s.progress = 100;
                    s.last_sync = Some(report.synced_at);
                    s.total_records = report.inserted;
                });
                Ok(report)
            }
            Err(e) => {
                tracing::error!(error = %e, "sync failed");
                let message = e.to_string();
                self.status.send_modify(|s| {
                    s.phase = SyncPhase::Failed;
                    s.progress = 0;
                    s.error = Some(message);
                });
                self.status.send_modify(|s| s.phase = SyncPhase::Idle);
                Err(e)
            }
        }
    }

    async fn run(&self) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        let mut connectivity = self.connectivity.subscribe();

        // The connection may have dropped between the check in `sync` and the subscription
        if !self.connectivity.is_online() {
            return Err(SyncError::Offline);
        }

        let expected = self.settings.expected_total;
        let download = fetch_all(self.gateway.as_ref(), self.settings.page_size, |count| {
            let progress = download_progress(count, expected);
            self.status.send_modify(|s| s.progress = progress);
        });

        let records = tokio::select! {
            fetched = download => fetched?,
            _ = connectivity.wait_offline() => {
                tracing::warn!("connection lost during download");
                return Err(SyncError::Offline);
            }
        };
        let fetched = records.len();

        self.status.send_modify(|s| s.progress = WRITE_PROGRESS);
        // The write blocks; observers get to render the write phase first
        tokio::task::yield_now().await;

        let inserted = self.cache.put_all(&records)?;
        // Millisecond precision, same as the stored metadata
        let synced_at = Utc::now().trunc_subsecs(3);
        self.cache.record_sync(&SyncMetadata {
            timestamp: synced_at,
            count: inserted,
        })?;

        Ok(SyncReport {
            fetched,
            inserted,
            synced_at,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Run the automatic sync check; only the first call does anything
    pub async fn activate(&self) -> AutoSync {
        if self.activated.swap(true, Ordering::SeqCst) {
            return AutoSync::Skipped(SkipReason::AlreadyActivated);
        }
        self.auto_sync().await
    }

    async fn auto_sync(&self) -> AutoSync {
        if !self.connectivity.is_online() {
            tracing::debug!("offline, skipping automatic sync");
            return AutoSync::Skipped(SkipReason::Offline);
        }

        let stale = match self.cache.get_stats() {
            Ok(stats) => needs_sync(&stats, Utc::now(), self.settings.staleness_threshold),
            Err(e) => {
                tracing::warn!(error = %e, "cache stats unavailable, treating cache as stale");
                true
            }
        };
        if !stale {
            tracing::debug!("cache is fresh, skipping automatic sync");
            return AutoSync::Skipped(SkipReason::Fresh);
        }

        match self.sync().await {
            Ok(report) => AutoSync::Synced(report),
            Err(e) => AutoSync::Failed(e),
        }
    }

    /// Re-check staleness every time the connection comes back
    ///
    /// Never returns on its own; spawn it and abort the task to stop.
    pub async fn watch_reconnects(&self) {
        let mut watch = self.connectivity.subscribe();
        while let Some(transition) = watch.next_transition().await {
            if transition != Transition::WentOnline || self.is_syncing() {
                continue;
            }
            if let AutoSync::Failed(e) = self.auto_sync().await {
                tracing::warn!(error = %e, "sync after reconnect failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn stats(count: usize, hours_ago: Option<i64>, now: DateTime<Utc>) -> CacheStats {
        CacheStats {
            count,
            last_sync: hours_ago.map(|h| now - ChronoDuration::hours(h)),
            last_sync_count: count,
        }
    }

    #[test]
    fn test_needs_sync_policy() {
        let now = Utc::now();
        assert!(needs_sync(&stats(100, None, now), now, DAY));
        assert!(!needs_sync(&stats(100, Some(1), now), now, DAY));
        assert!(needs_sync(&stats(100, Some(25), now), now, DAY));
        assert!(needs_sync(&stats(0, Some(1), now), now, DAY));
        assert!(!needs_sync(&stats(100, Some(24), now), now, DAY));
        assert!(!needs_sync(&stats(100, Some(-2), now), now, DAY));
    }

    #[test]
    fn test_download_progress() {
        assert_eq!(download_progress(0, 2500), 0);
        assert_eq!(download_progress(1000, 2500), 32);
        assert_eq!(download_progress(2000, 2500), 64);
        assert_eq!(download_progress(2500, 2500), 80);
        assert_eq!(download_progress(5000, 2500), 80);
        assert_eq!(download_progress(1000, 21_510), 4);
        assert_eq!(download_progress(10, 0), 80);
    }

    #[test]
    fn test_in_flight_guard() {
        let flag = AtomicBool::new(false);
        let guard = InFlight::acquire(&flag).unwrap();
        assert!(InFlight::acquire(&flag).is_none());
        drop(guard);
        assert!(InFlight::acquire(&flag).is_some());
    }
}
