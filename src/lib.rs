//! Bank Ledger Engine Library
//! # Overview
//!
//! A transactional ledger for an in-game bank: players move money between
//! accounts, shop, save in term deposits, borrow, insure themselves, bid in
//! an auction and trade exchange assets. Every money movement runs as one
//! atomic unit against a versioned store, leaves ledger entries behind and
//! queues notifications that are delivered only once the unit commits.
//!
//! # Architecture
//!
//! - [`types`] - Domain records (accounts, loans, assets, ledger entries, errors)
//! - [`store`] - Versioned in-memory store with optimistic atomic units
//! - [`core`] - Business logic:
//!   - [`core::executor`] - The money-movement operations
//!   - [`core::admin`] - Registration, reviews and catalogue upkeep
//!   - [`core::settlement`] - Deposit maturation, auction close, price drift
//!   - [`core::scheduler`] - Periodic settlement on a tokio interval
//!   - [`core::engine`] - Executor and settlement wired together
//! - [`config`] - Tunable economic constants (TOML)
//! - [`io`] - Operation scripts, account reports and world seeds
//! - [`strategy`] - Sequential and concurrent script replay
//! - [`cli`] - Command-line arguments
//!
//! # Invariants
//!
//! - Balances, loyalty points and holdings never go negative
//! - Transfers conserve the total balance across accounts
//! - The ledger entries of an account sum to its balance
//! - A failed operation or settlement tick leaves no partial change

pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod store;
pub mod strategy;
pub mod types;

pub use config::EngineConfig;
pub use crate::core::{Executor, LedgerEngine, Settlement, SettlementScheduler};
pub use io::{write_accounts_csv, ReplayError, WorldSeed};
pub use store::LedgerStore;
pub use types::{Account, AccountId, ErrorKind, LedgerError, Operation};
