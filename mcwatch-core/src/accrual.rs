use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::ledger::{AccrualReport, Ledger};
use crate::presence::PresenceCache;
use crate::shutdown::Shutdown;
use crate::store::LedgerStore;

/// Credits playtime from the presence cache on a fixed period.
///
/// One tick is worth one minute for every player present in the snapshot at
/// that instant. Players who come and go between ticks are not counted.
pub struct AccrualLoop<S> {
    cache: PresenceCache,
    ledger: Arc<Ledger<S>>,
    interval: Duration,
}

impl<S: LedgerStore> AccrualLoop<S> {
    pub fn new(cache: PresenceCache, ledger: Arc<Ledger<S>>, interval: Duration) -> Self {
        Self {
            cache,
            ledger,
            interval,
        }
    }

    /// Run one accrual tick. Returns `None` when the latest snapshot is
    /// unreachable; the ledger is left untouched in that case.
    pub async fn tick(&self) -> Option<AccrualReport> {
        let snapshot = self.cache.current();
        let Some(status) = snapshot.status() else {
            debug!("server unreachable, skipping accrual tick");
            return None;
        };
        Some(self.ledger.accrue(status).await)
    }

    /// Tick until shutdown. The first tick happens one interval after start,
    /// once the poller has had time to publish a snapshot.
    pub async fn run(self, mut shutdown: Shutdown) {
        info!(interval_secs = self.interval.as_secs(), "accrual loop started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.wait() => break,
            }
            self.tick().await;
        }
        info!("accrual loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Snapshot;
    use crate::presence::tests::status;
    use crate::shutdown;
    use crate::store::MemoryStore;

    async fn setup() -> (PresenceCache, AccrualLoop<MemoryStore>) {
        let cache = PresenceCache::new();
        let ledger = Arc::new(Ledger::load(MemoryStore::new()).await);
        let accrual = AccrualLoop::new(cache.clone(), ledger, Duration::from_secs(60));
        (cache, accrual)
    }

    #[tokio::test]
    async fn test_unreachable_snapshot_skips_tick() {
        let (cache, accrual) = setup().await;
        cache.publish(Snapshot::Reachable(status(&["Steve"])));
        accrual.tick().await;

        cache.publish(Snapshot::Unreachable);
        assert_eq!(accrual.tick().await, None);
        assert_eq!(accrual.tick().await, None);

        assert_eq!(accrual.ledger.entry("Steve").await.unwrap().minutes, 1);
        assert_eq!(accrual.ledger.store().save_count(), 1);
    }

    #[tokio::test]
    async fn test_tick_before_first_poll_does_nothing() {
        let (_cache, accrual) = setup().await;
        assert_eq!(accrual.tick().await, None);
        assert!(accrual.ledger.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_credits_each_interval_until_shutdown() {
        let (cache, accrual) = setup().await;
        let ledger = accrual.ledger.clone();
        cache.publish(Snapshot::Reachable(status(&["Steve", "Alex"])));
        let (trigger, shutdown) = shutdown::channel();

        let handle = tokio::spawn(accrual.run(shutdown));
        tokio::time::sleep(Duration::from_secs(185)).await;
        trigger.trigger();
        handle.await.unwrap();

        assert_eq!(ledger.entry("Steve").await.unwrap().minutes, 3);
        assert_eq!(ledger.entry("Alex").await.unwrap().minutes, 3);
        assert_eq!(ledger.store().save_count(), 3);
    }
}
