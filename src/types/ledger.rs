//! Ledger entry types
//!
//! A ledger entry is an immutable record of one side of a money movement.
//! Entries are appended when the unit that produced them commits and are
//! never updated or removed.

use super::account::AccountId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Direction of a balance movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Funds added to the account balance
    Credit,
    /// Funds removed from the account balance
    Debit,
}

/// What kind of operation produced a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    OpeningBalance,
    TransferOut,
    TransferIn,
    ShopPurchase,
    DepositOpened,
    DepositMatured,
    LoanIssued,
    LoanRepaid,
    InsurancePurchased,
    AuctionEscrow,
    AuctionRefund,
    AssetBought,
    AssetSold,
    TaskReward,
    AdminAdjustment,
}

impl EntryKind {
    /// Human-readable action label shown in statements
    pub fn label(&self) -> &'static str {
        match self {
            EntryKind::OpeningBalance => "Opening balance",
            EntryKind::TransferOut => "Transfer sent",
            EntryKind::TransferIn => "Transfer received",
            EntryKind::ShopPurchase => "Shop purchase",
            EntryKind::DepositOpened => "Deposit opened",
            EntryKind::DepositMatured => "Deposit matured",
            EntryKind::LoanIssued => "Loan issued",
            EntryKind::LoanRepaid => "Loan repayment",
            EntryKind::InsurancePurchased => "Insurance purchase",
            EntryKind::AuctionEscrow => "Auction bid",
            EntryKind::AuctionRefund => "Auction refund",
            EntryKind::AssetBought => "Asset purchase",
            EntryKind::AssetSold => "Asset sale",
            EntryKind::TaskReward => "Task reward",
            EntryKind::AdminAdjustment => "Balance adjustment",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One side of a money movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry identifier
    pub id: Uuid,

    /// Account whose balance moved
    pub account: AccountId,

    /// Operation that produced the entry
    pub kind: EntryKind,

    /// Unsigned magnitude of the movement
    pub amount: Decimal,

    /// Whether the movement added or removed funds
    pub direction: Direction,

    /// Free-text note, e.g. the counterparty handle
    pub comment: String,

    /// Structured breakdown (shop line items, trade details)
    pub details: Option<serde_json::Value>,

    /// When the producing unit was executed
    pub timestamp: DateTime<Utc>,
}

impl LedgerEntry {
    /// Create a credit entry
    pub fn credit(
        account: AccountId,
        kind: EntryKind,
        amount: Decimal,
        comment: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(account, kind, amount, Direction::Credit, comment, timestamp)
    }

    /// Create a debit entry
    pub fn debit(
        account: AccountId,
        kind: EntryKind,
        amount: Decimal,
        comment: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(account, kind, amount, Direction::Debit, comment, timestamp)
    }

    fn new(
        account: AccountId,
        kind: EntryKind,
        amount: Decimal,
        direction: Direction,
        comment: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        LedgerEntry {
            id: Uuid::new_v4(),
            account,
            kind,
            amount,
            direction,
            comment: comment.into(),
            details: None,
            timestamp,
        }
    }

    /// Attach a structured detail payload
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Amount with its direction applied (credits positive, debits negative)
    pub fn signed_amount(&self) -> Decimal {
        match self.direction {
            Direction::Credit => self.amount,
            Direction::Debit => -self.amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::credit(Direction::Credit, Decimal::new(250, 1))]
    #[case::debit(Direction::Debit, Decimal::new(-250, 1))]
    fn test_signed_amount(#[case] direction: Direction, #[case] expected: Decimal) {
        let now = Utc::now();
        let entry = match direction {
            Direction::Credit => {
                LedgerEntry::credit(1, EntryKind::TransferIn, Decimal::new(250, 1), "", now)
            }
            Direction::Debit => {
                LedgerEntry::debit(1, EntryKind::TransferOut, Decimal::new(250, 1), "", now)
            }
        };
        assert_eq!(entry.signed_amount(), expected);
    }

    #[test]
    fn test_entries_get_distinct_ids() {
        let now = Utc::now();
        let a = LedgerEntry::credit(1, EntryKind::LoanIssued, Decimal::ONE, "", now);
        let b = LedgerEntry::credit(1, EntryKind::LoanIssued, Decimal::ONE, "", now);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_kind_display_uses_label() {
        assert_eq!(EntryKind::DepositMatured.to_string(), "Deposit matured");
    }
}
