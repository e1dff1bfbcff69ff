//! Core traits for the executor's collaborators
//!
//! The executor and the settlement scheduler depend on two capabilities they
//! do not own: a source of the current time and a place to send player
//! notifications. Both are trait objects so simulations and tests can swap
//! in deterministic implementations.

use crate::types::AccountId;
use chrono::{DateTime, Utc};

/// Source of the current time
pub trait Clock: Send + Sync {
    /// The current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Delivery channel for player-facing messages
///
/// `enqueue` is only ever called after the operation that produced the
/// message has committed. It has no return value: delivery problems are the
/// sink's own concern and never affect the money movement.
pub trait NotificationSink: Send + Sync {
    /// Queue `text` for the given account
    fn enqueue(&self, account: AccountId, text: &str);
}
