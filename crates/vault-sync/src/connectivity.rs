//! # Connectivity Monitor
//!
//! A shared online/offline flag. Whoever knows about the network feeds it
//! (the CLI runs [`Connectivity::spawn_probe`]); the orchestrator reads it
//! before starting and watches it while an operation runs.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use url::Url;

/// Longest a single probe may wait for an answer.
pub const MAX_PROBE_WAIT: Duration = Duration::from_secs(5);

/// One reachability check against `url`.
///
/// Any HTTP answer within `wait` counts as online. Connection errors and
/// silence past `wait` count as offline.
pub async fn probe(client: &reqwest::Client, url: Url, wait: Duration) -> bool {
    client.head(url).timeout(wait).send().await.is_ok()
}

/// Online/offline signal.
#[derive(Debug, Clone)]
pub struct Connectivity {
    online: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    pub fn new(initially_online: bool) -> Self {
        let (online, _) = watch::channel(initially_online);
        Connectivity {
            online: Arc::new(online),
        }
    }

    /// Records the current state. Returns true if it changed.
    pub fn set_online(&self, online: bool) -> bool {
        self.online.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        })
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }

    /// Resolves as soon as the signal reads offline.
    pub async fn wait_offline(&self) {
        let mut rx = self.online.subscribe();
        loop {
            if !*rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Probes `url` once and records the answer.
    pub async fn check(&self, client: &reqwest::Client, url: Url, wait: Duration) -> bool {
        let online = probe(client, url, wait).await;
        debug!(online, "Connectivity probe");
        if self.set_online(online) {
            info!(online, "Connectivity changed");
        }
        online
    }

    /// Probes `url` every `every`. A probe never waits longer than the
    /// interval (capped at 5 s), so a silent link reads offline in time.
    pub fn spawn_probe(&self, client: reqwest::Client, url: Url, every: Duration) -> JoinHandle<()> {
        let connectivity = self.clone();
        let wait = every.min(MAX_PROBE_WAIT);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                connectivity.check(&client, url.clone(), wait).await;
            }
        })
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}
