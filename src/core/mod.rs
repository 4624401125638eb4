//! Core module - installation records, cache, sync and search

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod debounce;
pub mod gateway;
pub mod installation;
pub mod live_search;
pub mod search;
pub mod sync;
pub mod text;

pub use cache::{CacheError, CacheStats, InstallationCache, SyncMetadata};
pub use config::Config;
pub use connectivity::{ConnectivityMonitor, ConnectivityProbe, ConnectivityWatch, HttpProbe, Transition};
pub use debounce::Debouncer;
pub use gateway::{fetch_all, Page, RemoteError, RemoteGateway, RestConfig, RestGateway, UnconfiguredGateway};
pub use installation::{Installation, InvalidRecord};
pub use live_search::{LiveSearch, SearchState};
pub use search::{SearchCoordinator, SearchError, SearchField, SearchSettings};
pub use sync::{
    download_progress, needs_sync, AutoSync, SkipReason, SyncError, SyncOrchestrator, SyncPhase,
    SyncReport, SyncSettings, SyncStatus,
};
