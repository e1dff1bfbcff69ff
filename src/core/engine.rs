//! Ledger engine
//!
//! This module provides the [`LedgerEngine`], which wires the executor and
//! the settlement batch over one shared store, clock and notification sink.
//!
//! Two flavours exist:
//! - [`LedgerEngine::simulated`] runs on a [`ManualClock`] that only moves
//!   when told to, so replays can fast-forward deposits and auctions
//! - [`LedgerEngine::live`] runs on the wall clock and is meant to be driven
//!   by a [`SettlementScheduler`]

use super::clock::{ManualClock, SystemClock};
use super::executor::Executor;
use super::scheduler::SettlementScheduler;
use super::settlement::{Settlement, SettlementReport};
use super::traits::{Clock, NotificationSink};
use crate::config::EngineConfig;
use crate::store::LedgerStore;
use crate::types::LedgerError;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Executor and settlement over a shared store
#[derive(Debug, Clone)]
pub struct LedgerEngine {
    executor: Executor,
    settlement: Arc<Settlement>,

    /// Present when the engine runs on simulated time
    manual_clock: Option<Arc<ManualClock>>,
}

impl LedgerEngine {
    /// Engine on simulated time starting at `start`
    ///
    /// # Arguments
    ///
    /// * `config` - Engine configuration
    /// * `start` - Initial simulated instant
    /// * `sink` - Receives committed notifications
    /// * `rng_seed` - Fixed seed for price drift; entropy when `None`
    pub fn simulated(
        config: EngineConfig,
        start: DateTime<Utc>,
        sink: Arc<dyn NotificationSink>,
        rng_seed: Option<u64>,
    ) -> Self {
        let clock = Arc::new(ManualClock::new(start));
        let executor = Executor::new(
            Arc::new(LedgerStore::new()),
            clock.clone(),
            sink,
            config,
        );
        Self::assemble(executor, rng_seed, Some(clock))
    }

    /// Engine on the wall clock
    pub fn live(
        config: EngineConfig,
        sink: Arc<dyn NotificationSink>,
        rng_seed: Option<u64>,
    ) -> Self {
        let executor = Executor::new(
            Arc::new(LedgerStore::new()),
            Arc::new(SystemClock),
            sink,
            config,
        );
        Self::assemble(executor, rng_seed, None)
    }

    fn assemble(
        executor: Executor,
        rng_seed: Option<u64>,
        manual_clock: Option<Arc<ManualClock>>,
    ) -> Self {
        let settlement = match rng_seed {
            Some(seed) => Settlement::with_seed(executor.clone(), seed),
            None => Settlement::new(executor.clone()),
        };
        Self {
            executor,
            settlement: Arc::new(settlement),
            manual_clock,
        }
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn store(&self) -> &Arc<LedgerStore> {
        self.executor.store()
    }

    pub fn settlement(&self) -> &Arc<Settlement> {
        &self.settlement
    }

    /// Current engine time
    pub fn now(&self) -> DateTime<Utc> {
        self.executor.clock().now()
    }

    /// Move simulated time forward
    ///
    /// Returns the new instant, or `None` when the engine runs on the wall
    /// clock.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::ArithmeticOverflow` when the new instant falls
    /// outside the representable calendar.
    pub fn advance(&self, by: Duration) -> Result<Option<DateTime<Utc>>, LedgerError> {
        match &self.manual_clock {
            Some(clock) => clock.advance(by).map(Some),
            None => Ok(None),
        }
    }

    /// Run one settlement batch now
    pub fn tick(&self) -> Result<SettlementReport, LedgerError> {
        self.settlement.tick()
    }

    /// Scheduler firing settlement on the configured period
    pub fn scheduler(&self) -> Arc<SettlementScheduler> {
        let interval_secs = self.executor.config().scheduler.interval_secs;
        let period = std::time::Duration::from_secs(interval_secs);
        Arc::new(SettlementScheduler::new(self.settlement.clone(), period))
    }
}
