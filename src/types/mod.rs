//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: Account and deposit types
//! - `ledger`: Append-only ledger entries
//! - `lending`: Loans, loan settings and insurance
//! - `market`: Exchange assets and the auction
//! - `shop`: Shop items and tasks
//! - `notification`: Messages queued for players
//! - `operation`: Replayable operation records
//! - `error`: Error types for the ledger engine

pub mod account;
pub mod error;
pub mod ledger;
pub mod lending;
pub mod market;
pub mod notification;
pub mod operation;
pub mod shop;

pub use account::{Account, AccountId, Deposit, TeamId};
pub use error::{ErrorKind, LedgerError, StoreError};
pub use ledger::{Direction, EntryKind, LedgerEntry};
pub use lending::{
    InsuranceOption, InsurancePolicy, Loan, LoanConfig, LoanRequest, LoanRequestId, OptionId,
    RequestStatus,
};
pub use market::{
    AssetCategory, AuctionState, Bid, ExchangeAsset, MarketSnapshot, Ticker, TradeDirection,
};
pub use notification::Notification;
pub use operation::Operation;
pub use shop::{
    CartLine, ItemId, PurchasedLine, ShopItem, SubmissionId, SubmissionStatus, Task, TaskId,
    TaskSubmission,
};
