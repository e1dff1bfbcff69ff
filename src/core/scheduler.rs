//! Settlement timer
//!
//! Fires [`Settlement::tick`] on a fixed period until cancelled. A tick
//! takes the store's commit latch and may retry, so it runs on the blocking
//! pool rather than on a runtime worker. A failed tick is logged and
//! counted; the loop carries on and the next tick starts from committed
//! state. Ticks that fall behind are skipped rather than replayed in a
//! burst.

use super::settlement::Settlement;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{spawn_blocking, JoinHandle};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Periodic driver of the settlement batch
#[derive(Debug)]
pub struct SettlementScheduler {
    settlement: Arc<Settlement>,
    period: Duration,
    committed: AtomicU64,
    failed: AtomicU64,
}

impl SettlementScheduler {
    pub fn new(settlement: Arc<Settlement>, period: Duration) -> Self {
        Self {
            settlement,
            period,
            committed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Ticks that committed so far
    pub fn committed_ticks(&self) -> u64 {
        self.committed.load(Ordering::Relaxed)
    }

    /// Ticks that were aborted so far
    pub fn failed_ticks(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Run until `cancel` fires
    ///
    /// The first tick happens one period after the call, not immediately.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!(period_secs = self.period.as_secs(), "settlement scheduler started");

        let mut interval = interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let settlement = Arc::clone(&self.settlement);
                    match spawn_blocking(move || settlement.tick()).await {
                        Ok(Ok(_)) => {
                            self.committed.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(Err(error)) => {
                            self.failed.fetch_add(1, Ordering::Relaxed);
                            warn!(%error, "settlement tick failed, retrying next period");
                        }
                        Err(error) => {
                            self.failed.fetch_add(1, Ordering::Relaxed);
                            error!(%error, "settlement task did not complete");
                        }
                    }
                }
            }
        }

        info!(
            committed = self.committed_ticks(),
            failed = self.failed_ticks(),
            "settlement scheduler stopped"
        );
    }

    /// Spawn [`SettlementScheduler::run`] on the current runtime
    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run(cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{world, World};
    use crate::core::traits::Clock;
    use crate::types::{AuctionState, Bid};
    use rust_decimal_macros::dec;

    fn scheduler(executor: crate::core::executor::Executor) -> Arc<SettlementScheduler> {
        let settlement = Arc::new(Settlement::with_seed(executor, 1));
        Arc::new(SettlementScheduler::new(settlement, Duration::from_secs(60)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_once_per_period_until_cancelled() {
        let World { executor, .. } = world(&[]);
        let scheduler = scheduler(executor);
        let cancel = CancellationToken::new();
        let handle = scheduler.spawn(cancel.clone());

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(scheduler.committed_ticks(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(scheduler.committed_ticks(), 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(scheduler.committed_ticks(), 3);

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(scheduler.failed_ticks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tick_does_not_stop_the_loop() {
        let World { executor, clock, .. } = world(&[]);
        executor
            .store()
            .run(clock.now(), 1, |unit| {
                unit.auction.put(AuctionState {
                    active: true,
                    ends_at: Some(unit.now()),
                    bids: vec![Bid {
                        bidder: 404,
                        handle: "ghost".to_string(),
                        amount: dec!(1),
                        placed_at: unit.now(),
                    }],
                    ..AuctionState::default()
                });
                Ok(())
            })
            .unwrap();
        let scheduler = scheduler(executor);
        let cancel = CancellationToken::new();
        let handle = scheduler.spawn(cancel.clone());

        tokio::time::sleep(Duration::from_secs(181)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(scheduler.failed_ticks(), 3);
        assert_eq!(scheduler.committed_ticks(), 0);
    }
}
