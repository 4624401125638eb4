//! Search-as-you-type on top of [`SearchCoordinator`]
//!
//! Every keystroke is a `submit`. Only the last submission inside a quiet
//! period is executed, and a result is applied only if no newer submission
//! arrived while it was running.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

use crate::core::debounce::Debouncer;
use crate::core::installation::Installation;
use crate::core::search::{SearchCoordinator, SearchField};

/// What the results list should currently show
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchState {
    pub query: String,
    pub field: SearchField,
    pub results: Vec<Installation>,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Debounced, latest-wins search front end
pub struct LiveSearch {
    coordinator: Arc<SearchCoordinator>,
    debouncer: Debouncer,
    generation: Arc<AtomicU64>,
    state: Arc<watch::Sender<SearchState>>,
}

impl LiveSearch {
    pub fn new(coordinator: Arc<SearchCoordinator>, debounce: Duration) -> Self {
        let (state, _) = watch::channel(SearchState::default());
        Self {
            coordinator,
            debouncer: Debouncer::new(debounce),
            generation: Arc::new(AtomicU64::new(0)),
            state: Arc::new(state),
        }
    }

    /// Latest published state
    pub fn state(&self) -> SearchState {
        self.state.borrow().clone()
    }

    /// Observe state changes (last value wins)
    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.state.subscribe()
    }

    /// Register new input; the search runs once input pauses
    pub fn submit(&self, query: impl Into<String>, field: SearchField) {
        let query = query.into();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let coordinator = Arc::clone(&self.coordinator);
        let current = Arc::clone(&self.generation);
        let state = Arc::clone(&self.state);

        self.debouncer.schedule(move || {
            tokio::spawn(run_search(coordinator, current, state, generation, query, field));
        });
    }

    /// Drop any pending input without searching
    ///
    /// A search already in flight finishes in the background but its result
    /// is discarded, so the loading flag is cleared here.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.debouncer.cancel();
        self.state.send_if_modified(|s| std::mem::replace(&mut s.is_loading, false));
    }
}

async fn run_search(
    coordinator: Arc<SearchCoordinator>,
    current: Arc<AtomicU64>,
    state: Arc<watch::Sender<SearchState>>,
    generation: u64,
    query: String,
    field: SearchField,
) {
    let is_current = || current.load(Ordering::SeqCst) == generation;

    if !is_current() {
        return;
    }
    state.send_modify(|s| {
        s.query = query.clone();
        s.field = field;
        s.is_loading = true;
        s.error = None;
    });

    let outcome = coordinator.search(&query, field).await;

    if !is_current() {
        tracing::debug!(query = %query, "discarding superseded search result");
        return;
    }

    state.send_modify(|s| {
        s.is_loading = false;
        match outcome {
            Ok(results) => {
                s.results = results;
                s.error = None;
            }
            Err(e) => {
                tracing::error!(error = %e, "search failed");
                s.results.clear();
                s.error = Some(e.message().to_string());
            }
        }
    });
}
