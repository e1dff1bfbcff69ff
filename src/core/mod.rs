//! Core business logic module
//!
//! This module contains the ledger and settlement components:
//! - `traits` - Clock and notification sink abstractions
//! - `clock` - Wall-clock and manually advanced clocks
//! - `notify` - Notification sinks
//! - `executor` - Atomic money-movement operations
//! - `admin` - Registration, reviews, auction control and catalogue upkeep
//! - `receipts` - Success payloads of executor operations
//! - `settlement` - The periodic settlement batch
//! - `scheduler` - Timer loop that fires settlement
//! - `engine` - Executor and settlement wired over one store

pub mod admin;
pub mod clock;
pub mod engine;
pub mod executor;
pub mod notify;
pub mod receipts;
pub mod scheduler;
pub mod settlement;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use admin::AccountPatch;
pub use clock::{ManualClock, SystemClock};
pub use engine::LedgerEngine;
pub use executor::Executor;
pub use notify::{LogSink, Outbox};
pub use receipts::{
    BidReceipt, CheckoutReceipt, LoanDecision, RepaymentReceipt, TradeReceipt, TransferReceipt,
};
pub use scheduler::SettlementScheduler;
pub use settlement::{Settlement, SettlementReport};
pub use traits::{Clock, NotificationSink};
