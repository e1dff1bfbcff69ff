//! Error types for the ledger engine
//!
//! This module defines every failure a money-movement operation or a
//! settlement tick can report. Errors are descriptive enough to be shown to
//! players as the reason an action was rejected.
//!
//! # Error Categories
//!
//! Each variant belongs to exactly one [`ErrorKind`]:
//!
//! - **Validation**: malformed input, rejected before the store is touched
//! - **NotFound**: a referenced account, asset, item or auction is missing
//! - **InsufficientFunds / InsufficientStock / InsufficientHoldings**:
//!   business rules checked against current state
//! - **Conflict**: the entity's lifecycle state forbids the operation
//! - **Store**: transient infrastructure failure, safe to retry

use super::account::AccountId;
use super::lending::{LoanRequestId, OptionId};
use super::market::Ticker;
use super::shop::{ItemId, SubmissionId, TaskId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Coarse classification of a [`LedgerError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    InsufficientFunds,
    InsufficientStock,
    InsufficientHoldings,
    Conflict,
    Store,
}

/// Infrastructure-level store failures
///
/// These never describe a business rule; retrying the whole operation is
/// always safe.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// A record read by the unit was changed by a concurrent commit
    #[error("Write conflict on {record}")]
    WriteConflict {
        /// Human-readable key of the conflicting record
        record: String,
    },

    /// Retries were exhausted without a successful commit
    #[error("Gave up after {attempts} conflicting attempts")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
    },
}

/// Main error type for the ledger engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// Amount is zero, negative or otherwise unusable
    #[error("Invalid amount {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: Decimal,
    },

    /// Quantity is zero or negative
    #[error("Invalid quantity {quantity}")]
    InvalidQuantity {
        /// The rejected quantity
        quantity: Decimal,
    },

    /// Checkout was called without any cart lines
    #[error("Cart is empty")]
    EmptyCart,

    /// Sender and recipient are the same account
    #[error("Account {account} cannot transfer to itself")]
    SelfTransfer {
        /// Account id
        account: AccountId,
    },

    /// Handle is empty or only whitespace
    #[error("Invalid handle '{handle}'")]
    InvalidHandle {
        /// The rejected handle
        handle: String,
    },

    /// Insurance duration string could not be parsed
    #[error("Invalid coverage duration '{raw}'")]
    InvalidDuration {
        /// The raw duration string
        raw: String,
    },

    /// More loyalty points offered than the cart is worth
    #[error("Cannot spend {points} loyalty points on a subtotal of {subtotal}")]
    LoyaltyExceedsSubtotal {
        /// Points offered
        points: u64,
        /// Cart subtotal
        subtotal: Decimal,
    },

    /// Arithmetic overflow would occur
    #[error("Arithmetic overflow in {operation}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
    },

    /// Account does not exist
    #[error("Account {account} not found")]
    AccountNotFound {
        /// The missing account id
        account: AccountId,
    },

    /// Shop item does not exist
    #[error("Shop item {item} not found")]
    ItemNotFound {
        /// The missing item id
        item: ItemId,
    },

    /// Exchange asset does not exist
    #[error("Asset '{ticker}' not found")]
    AssetNotFound {
        /// The unknown ticker
        ticker: Ticker,
    },

    /// Insurance option does not exist
    #[error("Insurance option {option} not found")]
    OptionNotFound {
        /// The missing option id
        option: OptionId,
    },

    /// No auction is currently accepting bids
    #[error("No active auction")]
    AuctionNotActive,

    /// Pending loan request does not exist
    #[error("Loan request {request} not found")]
    LoanRequestNotFound {
        /// The missing request id
        request: LoanRequestId,
    },

    /// Task does not exist
    #[error("Task {task} not found")]
    TaskNotFound {
        /// The missing task id
        task: TaskId,
    },

    /// Task submission does not exist
    #[error("Task submission {submission} not found")]
    SubmissionNotFound {
        /// The missing submission id
        submission: SubmissionId,
    },

    /// Balance too low for the requested debit
    #[error(
        "Insufficient funds for account {account}: available {available}, requested {requested}"
    )]
    InsufficientFunds {
        /// Account id
        account: AccountId,
        /// Current balance
        available: Decimal,
        /// Amount that would have been debited
        requested: Decimal,
    },

    /// Loyalty balance too low for the points offered
    #[error("Insufficient loyalty points for account {account}: available {available}, requested {requested}")]
    InsufficientLoyaltyPoints {
        /// Account id
        account: AccountId,
        /// Current points
        available: u64,
        /// Points offered
        requested: u64,
    },

    /// Not enough units of a shop item in stock
    #[error("Insufficient stock for item {item}: available {available}, requested {requested}")]
    InsufficientStock {
        /// Item id
        item: ItemId,
        /// Units in stock
        available: u32,
        /// Units requested across the cart
        requested: u32,
    },

    /// Not enough units of an asset held to sell
    #[error("Insufficient holdings of '{ticker}' for account {account}: held {held}, requested {requested}")]
    InsufficientHoldings {
        /// Account id
        account: AccountId,
        /// Asset ticker
        ticker: Ticker,
        /// Quantity held
        held: Decimal,
        /// Quantity offered for sale
        requested: Decimal,
    },

    /// Bid does not strictly exceed the current highest bid
    #[error("Bid {bid} must exceed the current highest bid of {highest}")]
    BidTooLow {
        /// The rejected bid
        bid: Decimal,
        /// Current highest bid (zero when there is none)
        highest: Decimal,
    },

    /// Account already has a deposit running
    #[error("Account {account} already has an active deposit")]
    DepositAlreadyActive {
        /// Account id
        account: AccountId,
    },

    /// Nothing is owed on the account
    #[error("Account {account} has no active loan")]
    NoActiveLoan {
        /// Account id
        account: AccountId,
    },

    /// Request would push the account above the loan limit
    #[error("Loan of {requested} on top of {current_debt} exceeds the limit of {max}")]
    LoanLimitExceeded {
        /// Debt already owed
        current_debt: Decimal,
        /// Newly requested amount
        requested: Decimal,
        /// Configured maximum aggregate debt
        max: Decimal,
    },

    /// Account is blocked and cannot move money
    #[error("Account {account} is blocked")]
    AccountBlocked {
        /// Account id
        account: AccountId,
    },

    /// Handle is already registered
    #[error("Handle '{handle}' is already taken")]
    HandleTaken {
        /// The duplicate handle
        handle: String,
    },

    /// Loan request has already been approved or rejected
    #[error("Loan request {request} was already reviewed")]
    RequestAlreadyReviewed {
        /// Request id
        request: LoanRequestId,
    },

    /// Submission has already been approved or rejected
    #[error("Task submission {submission} was already reviewed")]
    SubmissionAlreadyReviewed {
        /// Submission id
        submission: SubmissionId,
    },

    /// Store-level failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::InvalidAmount { .. }
            | LedgerError::InvalidQuantity { .. }
            | LedgerError::EmptyCart
            | LedgerError::SelfTransfer { .. }
            | LedgerError::InvalidHandle { .. }
            | LedgerError::InvalidDuration { .. }
            | LedgerError::LoyaltyExceedsSubtotal { .. }
            | LedgerError::ArithmeticOverflow { .. } => ErrorKind::Validation,

            LedgerError::AccountNotFound { .. }
            | LedgerError::ItemNotFound { .. }
            | LedgerError::AssetNotFound { .. }
            | LedgerError::OptionNotFound { .. }
            | LedgerError::AuctionNotActive
            | LedgerError::LoanRequestNotFound { .. }
            | LedgerError::TaskNotFound { .. }
            | LedgerError::SubmissionNotFound { .. } => ErrorKind::NotFound,

            LedgerError::InsufficientFunds { .. }
            | LedgerError::InsufficientLoyaltyPoints { .. } => ErrorKind::InsufficientFunds,

            LedgerError::InsufficientStock { .. } => ErrorKind::InsufficientStock,

            LedgerError::InsufficientHoldings { .. } => ErrorKind::InsufficientHoldings,

            LedgerError::BidTooLow { .. }
            | LedgerError::DepositAlreadyActive { .. }
            | LedgerError::NoActiveLoan { .. }
            | LedgerError::LoanLimitExceeded { .. }
            | LedgerError::AccountBlocked { .. }
            | LedgerError::HandleTaken { .. }
            | LedgerError::RequestAlreadyReviewed { .. }
            | LedgerError::SubmissionAlreadyReviewed { .. } => ErrorKind::Conflict,

            LedgerError::Store(_) => ErrorKind::Store,
        }
    }

    /// Whether retrying the whole operation may succeed
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Store
    }
}

// Helper functions for creating common errors

impl LedgerError {
    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: Decimal) -> Self {
        LedgerError::InvalidAmount { amount }
    }

    /// Create an InvalidQuantity error
    pub fn invalid_quantity(quantity: Decimal) -> Self {
        LedgerError::InvalidQuantity { quantity }
    }

    /// Create an InvalidDuration error
    pub fn invalid_duration(raw: &str) -> Self {
        LedgerError::InvalidDuration {
            raw: raw.to_string(),
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
        }
    }

    /// Create an AccountNotFound error
    pub fn account_not_found(account: AccountId) -> Self {
        LedgerError::AccountNotFound { account }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(account: AccountId, available: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientFunds {
            account,
            available,
            requested,
        }
    }

    /// Create an InsufficientStock error
    pub fn insufficient_stock(item: ItemId, available: u32, requested: u32) -> Self {
        LedgerError::InsufficientStock {
            item,
            available,
            requested,
        }
    }

    /// Create an InsufficientHoldings error
    pub fn insufficient_holdings(
        account: AccountId,
        ticker: &str,
        held: Decimal,
        requested: Decimal,
    ) -> Self {
        LedgerError::InsufficientHoldings {
            account,
            ticker: ticker.to_string(),
            held,
            requested,
        }
    }

    /// Create a BidTooLow error
    pub fn bid_too_low(bid: Decimal, highest: Decimal) -> Self {
        LedgerError::BidTooLow { bid, highest }
    }

    /// Create an AccountBlocked error
    pub fn account_blocked(account: AccountId) -> Self {
        LedgerError::AccountBlocked { account }
    }

    /// Create a WriteConflict store error
    pub fn write_conflict(record: impl Into<String>) -> Self {
        LedgerError::Store(StoreError::WriteConflict {
            record: record.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::invalid_amount(
        LedgerError::InvalidAmount { amount: Decimal::new(-5, 0) },
        "Invalid amount -5"
    )]
    #[case::empty_cart(LedgerError::EmptyCart, "Cart is empty")]
    #[case::insufficient_funds(
        LedgerError::InsufficientFunds { account: 1, available: Decimal::new(5000, 2), requested: Decimal::new(10000, 2) },
        "Insufficient funds for account 1: available 50.00, requested 100.00"
    )]
    #[case::insufficient_stock(
        LedgerError::InsufficientStock { item: 4, available: 3, requested: 5 },
        "Insufficient stock for item 4: available 3, requested 5"
    )]
    #[case::bid_too_low(
        LedgerError::BidTooLow { bid: Decimal::new(50, 0), highest: Decimal::new(50, 0) },
        "Bid 50 must exceed the current highest bid of 50"
    )]
    #[case::loan_limit(
        LedgerError::LoanLimitExceeded { current_debt: Decimal::new(4000, 0), requested: Decimal::new(2000, 0), max: Decimal::new(5000, 0) },
        "Loan of 2000 on top of 4000 exceeds the limit of 5000"
    )]
    #[case::store(
        LedgerError::Store(StoreError::WriteConflict { record: "account 3".to_string() }),
        "Store error: Write conflict on account 3"
    )]
    fn test_error_display(#[case] error: LedgerError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[rstest]
    #[case::validation(LedgerError::EmptyCart, ErrorKind::Validation)]
    #[case::not_found(LedgerError::account_not_found(9), ErrorKind::NotFound)]
    #[case::auction(LedgerError::AuctionNotActive, ErrorKind::NotFound)]
    #[case::funds(
        LedgerError::insufficient_funds(1, Decimal::ZERO, Decimal::ONE),
        ErrorKind::InsufficientFunds
    )]
    #[case::loyalty(
        LedgerError::InsufficientLoyaltyPoints { account: 1, available: 0, requested: 3 },
        ErrorKind::InsufficientFunds
    )]
    #[case::stock(LedgerError::insufficient_stock(1, 3, 5), ErrorKind::InsufficientStock)]
    #[case::holdings(
        LedgerError::insufficient_holdings(1, "ACME", Decimal::ONE, Decimal::TWO),
        ErrorKind::InsufficientHoldings
    )]
    #[case::conflict(LedgerError::DepositAlreadyActive { account: 1 }, ErrorKind::Conflict)]
    #[case::store(LedgerError::write_conflict("auction"), ErrorKind::Store)]
    fn test_error_kind(#[case] error: LedgerError, #[case] expected: ErrorKind) {
        assert_eq!(error.kind(), expected);
    }

    #[test]
    fn test_only_store_errors_are_retryable() {
        assert!(LedgerError::write_conflict("account 1").is_retryable());
        assert!(!LedgerError::EmptyCart.is_retryable());
        assert!(!LedgerError::bid_too_low(Decimal::ONE, Decimal::TWO).is_retryable());
    }

    #[test]
    fn test_store_error_conversion() {
        let error: LedgerError = StoreError::RetriesExhausted { attempts: 5 }.into();
        assert!(matches!(error, LedgerError::Store(_)));
        assert_eq!(
            error.to_string(),
            "Store error: Gave up after 5 conflicting attempts"
        );
    }
}
