//! Engine configuration
//!
//! Tunable economic constants and runtime settings. Every field has a
//! default matching the stock game economy, so an empty TOML document is a
//! valid configuration.
//!
//! ```toml
//! [deposit]
//! term_hours = 24
//! rate = "0.10"
//!
//! [drift]
//! magnitude_pct = "1"
//! skew = "0.01"
//!
//! [scheduler]
//! interval_secs = 60
//! ```

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("Failed to read config '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for the expected shape
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub deposit: DepositConfig,
    pub drift: DriftConfig,
    pub scheduler: SchedulerConfig,
    pub retry: RetryConfig,
    pub rewards: RewardConfig,
}

/// Term deposit terms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepositConfig {
    /// Hours until a deposit matures
    pub term_hours: i64,

    /// Profit paid on maturity as a fraction of the principal
    pub rate: Decimal,
}

impl Default for DepositConfig {
    fn default() -> Self {
        Self {
            term_hours: 24,
            rate: Decimal::new(10, 2),
        }
    }
}

/// Market price drift applied on every settlement tick
///
/// Each tick samples `u` uniformly from `[0, 1)` and moves the price by
/// `(u - 0.5 + skew) * 2 * magnitude_pct` percent. The default skew of
/// `0.01` tilts sampling slightly toward price rises.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Half-width of the drift band in percent
    pub magnitude_pct: Decimal,

    /// Offset added to the centred sample
    pub skew: Decimal,

    /// Prices never drift below this floor
    pub min_price: Decimal,

    /// Decimal places kept after each drift step
    pub price_scale: u32,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            magnitude_pct: Decimal::ONE,
            skew: Decimal::new(1, 2),
            min_price: Decimal::new(1, 2),
            price_scale: 4,
        }
    }
}

/// Settlement timer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between settlement ticks
    pub interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

/// Store conflict retry policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per operation before a conflict is surfaced
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

/// Loyalty point accrual
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// One loyalty point is earned per this many currency units
    pub loyalty_divisor: Decimal,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            loyalty_divisor: Decimal::new(100, 0),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&source)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.deposit.term_hours <= 0 {
            return Err(ConfigError::Invalid(format!(
                "deposit.term_hours must be positive, got {}",
                self.deposit.term_hours
            )));
        }
        if Duration::try_hours(self.deposit.term_hours).is_none() {
            return Err(ConfigError::Invalid(format!(
                "deposit.term_hours is out of range, got {}",
                self.deposit.term_hours
            )));
        }
        if self.deposit.rate.is_sign_negative() {
            return Err(ConfigError::Invalid(format!(
                "deposit.rate must not be negative, got {}",
                self.deposit.rate
            )));
        }
        if self.drift.magnitude_pct.is_sign_negative()
            || self.drift.magnitude_pct >= Decimal::ONE_HUNDRED
        {
            return Err(ConfigError::Invalid(format!(
                "drift.magnitude_pct must be within [0, 100), got {}",
                self.drift.magnitude_pct
            )));
        }
        if self.drift.min_price <= Decimal::ZERO {
            return Err(ConfigError::Invalid(format!(
                "drift.min_price must be positive, got {}",
                self.drift.min_price
            )));
        }
        if self.scheduler.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.interval_secs must be positive".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.rewards.loyalty_divisor <= Decimal::ZERO {
            return Err(ConfigError::Invalid(format!(
                "rewards.loyalty_divisor must be positive, got {}",
                self.rewards.loyalty_divisor
            )));
        }
        Ok(())
    }
}
