//! Account-related types for the ledger engine
//!
//! This module defines the Account structure and the deposit sub-state
//! that lives on it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account identifier
///
/// Assigned by the store on registration, never reused.
pub type AccountId = u64;

/// Team identifier (optional grouping of accounts)
pub type TeamId = u32;

/// A term deposit locked on an account until it matures
///
/// Amount and maturity are held together so an account can never carry
/// one without the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deposit {
    /// Principal moved out of the balance when the deposit was opened
    pub amount: Decimal,

    /// Instant at which the deposit becomes eligible for payout
    pub matures_at: DateTime<Utc>,
}

impl Deposit {
    /// Whether the deposit is eligible for payout at `now`
    pub fn is_mature(&self, now: DateTime<Utc>) -> bool {
        self.matures_at <= now
    }
}

/// Player account state
///
/// Represents everything the ledger tracks directly on a player: spendable
/// balance, loyalty points, an optional term deposit and administrative
/// flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Store-assigned identifier
    pub id: AccountId,

    /// Unique display handle
    ///
    /// Set at registration and never changed afterwards.
    pub handle: String,

    /// Spendable funds
    ///
    /// Never negative. Every change is mirrored by a ledger entry, so the
    /// signed sum of an account's entries always equals this value.
    pub balance: Decimal,

    /// Loyalty points earned from transfers, purchases and tasks
    pub loyalty_points: u64,

    /// Active term deposit, if any
    pub deposit: Option<Deposit>,

    /// Lifetime profit paid out by matured deposits
    pub deposit_earnings: Decimal,

    /// Blocked accounts cannot initiate money movements
    pub blocked: bool,

    /// Administrator accounts are excluded from broadcasts
    pub admin: bool,

    /// Optional team membership
    pub team: Option<TeamId>,
}

impl Account {
    /// Create a new account with zero balances
    ///
    /// # Arguments
    ///
    /// * `id` - The store-assigned identifier
    /// * `handle` - The unique display handle
    pub fn new(id: AccountId, handle: impl Into<String>) -> Self {
        Account {
            id,
            handle: handle.into(),
            balance: Decimal::ZERO,
            loyalty_points: 0,
            deposit: None,
            deposit_earnings: Decimal::ZERO,
            blocked: false,
            admin: false,
            team: None,
        }
    }

    /// Whether the account currently has funds locked in a deposit
    pub fn has_active_deposit(&self) -> bool {
        self.deposit.is_some()
    }
}
