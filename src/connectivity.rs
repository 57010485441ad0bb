//! Connectivity gate consulted before every network call.
//!
//! # Data Flow
//! ```text
//! Active probe (check_connectivity / run loop):
//!     TCP connect to each probe host with a short timeout → any success = online
//! Passive notification (set_online):
//!     platform or caller reports a change
//! Both:
//!     → AtomicBool (read by provider clients)
//!     → watch channel (observable stream of changes)
//! ```

use futures_util::future::join_all;
use futures_util::stream::{self, Stream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch};

use crate::config::ConnectivityConfig;
use crate::observability::metrics;

/// Shared online/offline state.
#[derive(Debug)]
pub struct OfflineGate {
    online: AtomicBool,
    tx: watch::Sender<bool>,
    probe_hosts: Vec<String>,
    probe_timeout: Duration,
}

impl OfflineGate {
    /// Starts online; the first probe or notification corrects it.
    pub fn new(config: &ConnectivityConfig) -> Self {
        let (tx, _) = watch::channel(true);
        Self {
            online: AtomicBool::new(true),
            tx,
            probe_hosts: config.probe_hosts.clone(),
            probe_timeout: Duration::from_millis(config.probe_timeout_ms),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Passive update. Returns true when the state changed.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.online.swap(online, Ordering::AcqRel);
        if previous == online {
            return false;
        }
        if online {
            tracing::info!("Connectivity restored");
        } else {
            tracing::warn!("Connectivity lost, serving from cache only");
        }
        metrics::record_online(online);
        self.tx.send_replace(online);
        true
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Stream of state changes, starting after the current value.
    pub fn changes(&self) -> impl Stream<Item = bool> + Send + 'static {
        let rx = self.tx.subscribe();
        stream::unfold(rx, |mut rx| async move {
            rx.changed().await.ok()?;
            let online = *rx.borrow_and_update();
            Some((online, rx))
        })
    }

    /// Probe every configured host concurrently. Never errors: any failure
    /// counts as that host being unreachable.
    pub async fn check_connectivity(&self) -> bool {
        let probes = self.probe_hosts.iter().map(|host| self.probe(host));
        let online = join_all(probes).await.into_iter().any(|ok| ok);
        self.set_online(online);
        online
    }

    async fn probe(&self, host: &str) -> bool {
        match tokio::time::timeout(self.probe_timeout, TcpStream::connect(host)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!(host, error = %e, "Connectivity probe failed");
                false
            }
            Err(_) => {
                tracing::debug!(host, "Connectivity probe timed out");
                false
            }
        }
    }

    /// Re-probe every `interval` until shutdown.
    pub async fn run(&self, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(interval);
        tracing::info!(interval_secs = interval.as_secs(), "Connectivity monitor started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_connectivity().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Connectivity monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
