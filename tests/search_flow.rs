//! Search routing and search-as-you-type against a fake backend

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{break_cache, generate, installation, sample_set, seed_cache, FakeGateway};
use tempfile::TempDir;
use georescue::core::{
    ConnectivityMonitor, InstallationCache, LiveSearch, SearchCoordinator, SearchField,
    SearchSettings,
};

fn coordinator(
    gateway: &Arc<FakeGateway>,
    cache: &Arc<InstallationCache>,
    online: bool,
) -> SearchCoordinator {
    SearchCoordinator::new(
        gateway.clone(),
        Arc::clone(cache),
        ConnectivityMonitor::new(online),
        SearchSettings::default(),
    )
}

fn seeded_cache(records: &[georescue::core::Installation]) -> Arc<InstallationCache> {
    let cache = Arc::new(InstallationCache::open_in_memory().unwrap());
    seed_cache(&cache, records, Utc::now());
    cache
}

// ============================================================================
// Routing
// ============================================================================

#[tokio::test]
async fn test_online_search_uses_backend() {
    let gateway = Arc::new(FakeGateway::new(vec![installation(
        "r1",
        "777001",
        "Remote Only",
        "Rua Remota",
    )]));
    let cache = seeded_cache(&sample_set());
    let search = coordinator(&gateway, &cache, true);

    let results = search.search("remote", SearchField::Name).await.unwrap();

    assert_eq!(gateway.searches(), 1);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "r1");
}

#[tokio::test]
async fn test_backend_failure_falls_back_to_cache() {
    let gateway = Arc::new(FakeGateway::new(Vec::new()).failing_search());
    let cache = seeded_cache(&sample_set());
    let search = coordinator(&gateway, &cache, true);

    let results = search.search("silva", SearchField::Name).await.unwrap();

    assert_eq!(gateway.searches(), 1);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "Jose Silva");
}

#[tokio::test]
async fn test_offline_search_never_touches_backend() {
    let gateway = Arc::new(FakeGateway::new(sample_set()));
    let cache = seeded_cache(&sample_set());
    let search = coordinator(&gateway, &cache, false);

    let results = search.search("1002", SearchField::InstallationNumber).await.unwrap();

    assert_eq!(gateway.searches(), 0);
    let numbers: Vec<_> = results.iter().map(|r| r.installation_number.as_str()).collect();
    assert_eq!(numbers, vec!["100200", "100201"]);
}

#[tokio::test]
async fn test_offline_search_is_accent_insensitive() {
    let gateway = Arc::new(FakeGateway::default());
    let cache = seeded_cache(&sample_set());
    let search = coordinator(&gateway, &cache, false);

    let jose = search.search("josé", SearchField::Name).await.unwrap();
    assert_eq!(jose.len(), 1);
    assert_eq!(jose[0].name, "Jose Silva");

    let joao = search.search("JOAO", SearchField::Name).await.unwrap();
    assert_eq!(joao.len(), 1);
    assert_eq!(joao[0].name, "João Pereira");
}

#[tokio::test]
async fn test_short_query_touches_nothing() {
    let gateway = Arc::new(FakeGateway::new(sample_set()));
    let cache = seeded_cache(&sample_set());

    for online in [true, false] {
        let search = coordinator(&gateway, &cache, online);
        assert!(search.search("j", SearchField::Name).await.unwrap().is_empty());
        assert!(search.search("", SearchField::Address).await.unwrap().is_empty());
    }
    assert_eq!(gateway.searches(), 0);
}

#[tokio::test]
async fn test_offline_empty_cache_returns_nothing() {
    let gateway = Arc::new(FakeGateway::default());
    let cache = Arc::new(InstallationCache::open_in_memory().unwrap());
    let search = coordinator(&gateway, &cache, false);

    let results = search.search("anything", SearchField::Address).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_results_are_capped() {
    let records = generate(150);
    let gateway = Arc::new(FakeGateway::new(records.clone()).failing_search());
    let cache = seeded_cache(&records);

    let offline = coordinator(&gateway, &cache, false);
    let results = offline.search("customer", SearchField::Name).await.unwrap();
    assert_eq!(results.len(), 100);

    let online = coordinator(&Arc::new(FakeGateway::new(records)), &cache, true);
    let results = online.search("customer", SearchField::Name).await.unwrap();
    assert_eq!(results.len(), 100);
}

// ============================================================================
// Unusable cache
// ============================================================================

/// File-backed cache whose installations table has been dropped
fn broken_cache(tmp: &TempDir) -> Arc<InstallationCache> {
    let path = tmp.path().join("cache.db");
    let cache = Arc::new(InstallationCache::open(&path).unwrap());
    seed_cache(&cache, &sample_set(), Utc::now());
    break_cache(&path, "DROP TABLE installations");
    cache
}

#[tokio::test]
async fn test_offline_search_reports_broken_cache() {
    let tmp = TempDir::new().unwrap();
    let gateway = Arc::new(FakeGateway::new(sample_set()));
    let search = coordinator(&gateway, &broken_cache(&tmp), false);

    let err = search.search("silva", SearchField::Name).await.unwrap_err();

    assert!(!err.message().is_empty());
    assert_eq!(gateway.searches(), 0);
}

#[tokio::test]
async fn test_backend_and_cache_both_failing() {
    let tmp = TempDir::new().unwrap();
    let gateway = Arc::new(FakeGateway::new(sample_set()).failing_search());
    let search = coordinator(&gateway, &broken_cache(&tmp), true);

    let err = search.search("silva", SearchField::Name).await.unwrap_err();

    assert!(!err.message().is_empty());
    assert_eq!(gateway.searches(), 1);
}

#[tokio::test]
async fn test_broken_cache_still_allows_backend_search() {
    let tmp = TempDir::new().unwrap();
    let gateway = Arc::new(FakeGateway::new(sample_set()));
    let search = coordinator(&gateway, &broken_cache(&tmp), true);

    let results = search.search("silva", SearchField::Name).await.unwrap();
    assert_eq!(results.len(), 1);
}

// ============================================================================
// Lookup by number
// ============================================================================

#[tokio::test]
async fn test_lookup_prefers_cache() {
    let gateway = Arc::new(FakeGateway::new(sample_set()));
    let cache = seeded_cache(&sample_set());
    let search = coordinator(&gateway, &cache, true);

    let found = search.find_by_number("300400").await.unwrap().unwrap();

    assert_eq!(found.name, "João Pereira");
    assert_eq!(gateway.lookups(), 0);
}

#[tokio::test]
async fn test_lookup_miss_asks_backend_when_online() {
    let remote = installation("r9", "999999", "New Customer", "Rua Nova");
    let gateway = Arc::new(FakeGateway::new(vec![remote.clone()]));
    let cache = seeded_cache(&sample_set());

    let online = coordinator(&gateway, &cache, true);
    assert_eq!(online.find_by_number("999999").await.unwrap(), Some(remote));
    assert_eq!(gateway.lookups(), 1);

    let offline = coordinator(&gateway, &cache, false);
    assert_eq!(offline.find_by_number("999999").await.unwrap(), None);
    assert_eq!(gateway.lookups(), 1);
}

// ============================================================================
// Search-as-you-type
// ============================================================================

fn live(gateway: &Arc<FakeGateway>, online: bool) -> LiveSearch {
    let cache = seeded_cache(&sample_set());
    LiveSearch::new(
        Arc::new(coordinator(gateway, &cache, online)),
        Duration::from_millis(300),
    )
}

#[tokio::test(start_paused = true)]
async fn test_typing_burst_runs_one_search() {
    let gateway = Arc::new(FakeGateway::new(sample_set()));
    let live = live(&gateway, true);

    for prefix in ["ma", "mar", "mari", "maria"] {
        live.submit(prefix, SearchField::Name);
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(gateway.searches(), 1);
    let state = live.state();
    assert_eq!(state.query, "maria");
    assert!(!state.is_loading);
    assert_eq!(state.results.len(), 1);
    assert_eq!(state.results[0].name, "Maria Souza");
}

#[tokio::test(start_paused = true)]
async fn test_superseded_result_is_discarded() {
    let gateway = Arc::new(FakeGateway::new(sample_set()).search_delay(Duration::from_millis(500)));
    let live = live(&gateway, true);

    // "silva" starts at 300ms and would finish at 800ms
    live.submit("silva", SearchField::Name);
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(live.state().is_loading);

    // "souza" starts at 650ms and finishes at 1150ms
    live.submit("souza", SearchField::Name);
    tokio::time::sleep(Duration::from_millis(550)).await;

    // 900ms: the stale "silva" answer has arrived and must not be shown
    let state = live.state();
    assert_eq!(state.query, "souza");
    assert!(state.is_loading);
    assert!(state.results.is_empty());

    tokio::time::sleep(Duration::from_millis(400)).await;
    let state = live.state();
    assert!(!state.is_loading);
    assert_eq!(state.results.len(), 1);
    assert_eq!(state.results[0].name, "Maria Souza");
    assert_eq!(gateway.searches(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_drops_pending_input() {
    let gateway = Arc::new(FakeGateway::new(sample_set()));
    let live = live(&gateway, true);

    live.submit("silva", SearchField::Name);
    tokio::time::sleep(Duration::from_millis(100)).await;
    live.cancel();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(gateway.searches(), 0);
    assert_eq!(live.state().query, "");
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_search_clears_loading() {
    let gateway = Arc::new(FakeGateway::new(sample_set()).search_delay(Duration::from_millis(500)));
    let live = live(&gateway, true);

    live.submit("silva", SearchField::Name);
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(live.state().is_loading);

    live.cancel();
    assert!(!live.state().is_loading);

    // The backend answer arrives at 800ms and is dropped
    tokio::time::sleep(Duration::from_secs(5)).await;
    let state = live.state();
    assert!(!state.is_loading);
    assert!(state.results.is_empty());
    assert_eq!(gateway.searches(), 1);

    // A later search still works
    live.submit("souza", SearchField::Name);
    tokio::time::sleep(Duration::from_secs(1)).await;
    let state = live.state();
    assert!(!state.is_loading);
    assert_eq!(state.results.len(), 1);
    assert_eq!(state.results[0].name, "Maria Souza");
}
