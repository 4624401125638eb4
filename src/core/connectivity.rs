//! Online/offline tracking
//!
//! The monitor keeps the current status in an atomic so reads never block,
//! and broadcasts each edge (online->offline, offline->online) to
//! subscribers. What feeds it is up to the host: a platform signal, the
//! HTTP probe below, or a command-line flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Capacity of the transition channel; slow subscribers resync on overflow
const TRANSITION_BUFFER: usize = 16;

/// A connectivity edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    WentOnline,
    WentOffline,
}

impl Transition {
    fn to_status(self) -> bool {
        matches!(self, Transition::WentOnline)
    }
}

/// Shared connectivity state; clones observe the same status
#[derive(Clone)]
pub struct ConnectivityMonitor {
    online: Arc<AtomicBool>,
    transitions: broadcast::Sender<Transition>,
}

impl ConnectivityMonitor {
    /// Create a monitor with an initial status
    pub fn new(online: bool) -> Self {
        let (transitions, _) = broadcast::channel(TRANSITION_BUFFER);
        Self {
            online: Arc::new(AtomicBool::new(online)),
            transitions,
        }
    }

    /// Current status (never blocks)
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Record a new status, notifying subscribers if it changed
    ///
    /// Returns the transition that happened, if any.
    pub fn set_online(&self, online: bool) -> Option<Transition> {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return None;
        }

        let transition = if online {
            Transition::WentOnline
        } else {
            Transition::WentOffline
        };
        tracing::info!(?transition, "connectivity changed");

        // No subscribers is fine
        let _ = self.transitions.send(transition);
        Some(transition)
    }

    /// Subscribe to transitions; drop the watch to unsubscribe
    pub fn subscribe(&self) -> ConnectivityWatch {
        ConnectivityWatch {
            rx: self.transitions.subscribe(),
            online: Arc::clone(&self.online),
        }
    }

    /// Poll `probe` every `interval` and feed the result into this monitor
    pub fn spawn_probe<P>(&self, probe: P, interval: Duration) -> JoinHandle<()>
    where
        P: ConnectivityProbe + 'static,
    {
        let monitor = self.clone();
        tokio::spawn(async move {
            loop {
                let online = probe.check().await;
                monitor.set_online(online);
                tokio::time::sleep(interval).await;
            }
        })
    }
}

/// A subscription to connectivity transitions
pub struct ConnectivityWatch {
    rx: broadcast::Receiver<Transition>,
    online: Arc<AtomicBool>,
}

impl ConnectivityWatch {
    /// Wait for the next edge
    ///
    /// If this subscriber fell behind, the missed edges are collapsed into
    /// the current status. Returns `None` once the monitor is gone.
    pub async fn next_transition(&mut self) -> Option<Transition> {
        match self.rx.recv().await {
            Ok(t) => Some(t),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::debug!(missed, "connectivity subscriber lagged");
                let online = self.online.load(Ordering::SeqCst);
                Some(if online {
                    Transition::WentOnline
                } else {
                    Transition::WentOffline
                })
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    /// Resolve once the connection drops
    ///
    /// Never resolves if the monitor is dropped while online.
    pub async fn wait_offline(&mut self) {
        loop {
            match self.next_transition().await {
                Some(t) if !t.to_status() => return,
                Some(_) => continue,
                None => std::future::pending::<()>().await,
            }
        }
    }
}

/// Source of truth for reachability
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn check(&self) -> bool;
}

/// Treats any HTTP response from the backend as "online"
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
    async fn check(&self) -> bool {
        match self.client.head(&self.url).send().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(url = %self.url, error = %e, "reachability probe failed");
                false
            }
        }
    }
}
