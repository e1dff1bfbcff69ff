//! World seed
//!
//! A TOML document describing the accounts and catalogues a replay or a
//! served engine starts from. Every section is optional.
//!
//! ```toml
//! [[accounts]]
//! handle = "alice"
//! balance = "500"
//!
//! [[assets]]
//! ticker = "ACME"
//! category = "company"
//! price = "100"
//!
//! [[shop]]
//! id = 1
//! name = "Mug"
//! price = "50"
//! quantity = 5
//!
//! [loans]
//! max_amount = "5000"
//! interest_rate = "5"
//! auto_approve = true
//!
//! [auction]
//! lot = "Signed poster"
//! ends_in_hours = 48
//! ```

use crate::core::{AccountPatch, Executor};
use crate::types::{
    Account, ExchangeAsset, InsuranceOption, LedgerError, LoanConfig, ShopItem, Task, TeamId,
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read seed '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse seed: {0}")]
    Parse(#[from] toml::de::Error),

    /// The engine refused part of the seed
    #[error("Failed to apply seed: {0}")]
    Ledger(#[from] LedgerError),
}

/// Starting world for an engine
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WorldSeed {
    /// Registered in order, so the first account gets id 1
    pub accounts: Vec<AccountSeed>,
    pub assets: Vec<ExchangeAsset>,
    pub shop: Vec<ShopItem>,
    pub insurance: Vec<InsuranceOption>,
    pub tasks: Vec<Task>,
    pub loans: Option<LoanConfig>,
    pub auction: Option<AuctionSeed>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccountSeed {
    pub handle: String,
    #[serde(default)]
    pub balance: Decimal,
    #[serde(default)]
    pub loyalty: u64,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default)]
    pub team: Option<TeamId>,
}

/// Auction opened right after seeding
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AuctionSeed {
    pub lot: Option<String>,
    /// Hours from the engine's current time until the auction closes; open
    /// ended when absent
    pub ends_in_hours: Option<i64>,
}

impl WorldSeed {
    pub fn from_toml(source: &str) -> Result<Self, SeedError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self, SeedError> {
        let source = std::fs::read_to_string(path).map_err(|source| SeedError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&source)
    }

    /// Install the seed through the executor's admin operations
    ///
    /// Returns the registered accounts in seed order.
    pub fn apply(&self, executor: &Executor) -> Result<Vec<Account>, SeedError> {
        if let Some(loans) = &self.loans {
            executor.update_loan_config(loans.clone())?;
        }
        for asset in &self.assets {
            executor.list_asset(asset.clone())?;
        }
        for item in &self.shop {
            executor.upsert_shop_item(item.clone())?;
        }
        for option in &self.insurance {
            executor.upsert_insurance_option(option.clone())?;
        }
        for task in &self.tasks {
            executor.upsert_task(task.clone())?;
        }

        let mut accounts = Vec::with_capacity(self.accounts.len());
        for seed in &self.accounts {
            let mut account =
                executor.register_account(&seed.handle, seed.balance, seed.loyalty, seed.admin)?;
            if seed.blocked || seed.team.is_some() {
                let patch = AccountPatch {
                    blocked: seed.blocked.then_some(true),
                    team: seed.team.map(Some),
                    ..AccountPatch::default()
                };
                account = executor.adjust_account(account.id, patch)?;
            }
            accounts.push(account);
        }

        if let Some(auction) = &self.auction {
            let ends_at = auction
                .ends_in_hours
                .map(|hours| auction_end(executor, hours))
                .transpose()?;
            executor.configure_auction(true, ends_at, auction.lot.clone())?;
        }

        info!(
            accounts = accounts.len(),
            assets = self.assets.len(),
            shop_items = self.shop.len(),
            "world seeded"
        );
        Ok(accounts)
    }
}

/// Auction close `hours` from the executor's current time
fn auction_end(executor: &Executor, hours: i64) -> Result<DateTime<Utc>, SeedError> {
    let span = Duration::try_hours(hours)
        .ok_or_else(|| LedgerError::invalid_duration(&format!("{}h", hours)))?;
    let end = executor
        .clock()
        .now()
        .checked_add_signed(span)
        .ok_or_else(|| LedgerError::arithmetic_overflow("auction end"))?;
    Ok(end)
}
