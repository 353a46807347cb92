//! Shared presence snapshot and the poller that refreshes it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::models::Snapshot;
use crate::query::StatusSource;
use crate::shutdown::Shutdown;

/// Latest server snapshot, shared by every consumer.
///
/// The slot is swapped whole on each poll; readers get an `Arc` to a complete
/// snapshot and never see a half-written one. Until the first poll finishes
/// the slot holds `Snapshot::Unreachable`.
#[derive(Clone)]
pub struct PresenceCache {
    slot: Arc<watch::Sender<Arc<Snapshot>>>,
}

impl PresenceCache {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Snapshot::Unreachable));
        Self { slot: Arc::new(tx) }
    }

    /// The most recently published snapshot. Never waits on the network.
    pub fn current(&self) -> Arc<Snapshot> {
        self.slot.borrow().clone()
    }

    /// Replace the cached snapshot. The poller is the only caller outside tests.
    pub fn publish(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        self.slot.send_replace(snapshot.clone());
        snapshot
    }

    /// Receiver that is notified on every publish.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.slot.subscribe()
    }
}

impl Default for PresenceCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Short status text shown next to the bot's name.
pub fn status_line(snapshot: &Snapshot) -> String {
    match snapshot.status() {
        Some(status) => format!("the server [{}/{}]", status.online, status.max),
        None => "the server is offline".to_string(),
    }
}

/// Presentation sink for the status line.
pub trait StatusDisplay: Send + Sync + 'static {
    fn show(&self, text: &str);
}

impl StatusDisplay for () {
    fn show(&self, _text: &str) {}
}

impl<T: StatusDisplay> StatusDisplay for Arc<T> {
    fn show(&self, text: &str) {
        (**self).show(text);
    }
}

/// Periodically queries the server and republishes the presence cache.
pub struct Poller<S, D> {
    source: S,
    cache: PresenceCache,
    display: D,
    interval: Duration,
    was_reachable: Option<bool>,
}

impl<S: StatusSource, D: StatusDisplay> Poller<S, D> {
    pub fn new(source: S, cache: PresenceCache, display: D, interval: Duration) -> Self {
        Self {
            source,
            cache,
            display,
            interval,
            was_reachable: None,
        }
    }

    /// Run one query and publish the result. Query failures become
    /// `Snapshot::Unreachable`; nothing is propagated.
    pub async fn refresh(&mut self) -> Arc<Snapshot> {
        let snapshot = match self.source.query().await {
            Ok(status) => Snapshot::Reachable(status),
            Err(e) => {
                debug!(error = %e, "status query failed");
                Snapshot::Unreachable
            }
        };

        let reachable = snapshot.is_reachable();
        match (self.was_reachable, reachable) {
            (Some(true), false) => warn!("server became unreachable"),
            (Some(false) | None, true) => info!("server is reachable"),
            (None, false) => warn!("server is unreachable"),
            _ => {}
        }
        self.was_reachable = Some(reachable);

        let snapshot = self.cache.publish(snapshot);
        self.display.show(&status_line(&snapshot));
        snapshot
    }

    /// Poll until shutdown. A query in progress always completes first.
    pub async fn run(mut self, mut shutdown: Shutdown) {
        info!(interval_secs = self.interval.as_secs_f32(), "presence poller started");
        loop {
            self.refresh().await;
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.wait() => break,
            }
        }
        info!("presence poller stopped");
    }
}
