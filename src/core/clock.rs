//! Clock implementations

use super::traits::Clock;
use crate::types::LedgerError;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for simulations and tests
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward and return the new instant
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::ArithmeticOverflow` when the new instant falls
    /// outside the representable calendar; the clock is left unchanged.
    pub fn advance(&self, by: Duration) -> Result<DateTime<Utc>, LedgerError> {
        let mut now = self.now.lock();
        *now = now
            .checked_add_signed(by)
            .ok_or_else(|| LedgerError::arithmetic_overflow("clock advance"))?;
        Ok(*now)
    }

    /// Jump to an absolute instant
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
