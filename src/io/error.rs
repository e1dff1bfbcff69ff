//! Errors raised while loading inputs and replaying operation scripts
//!
//! Per-line problems (`Malformed`, `Ledger`, `RealClock`) are reported and
//! skipped by the replay strategies. Everything else aborts the run.

use super::seed::SeedError;
use crate::config::ConfigError;
use crate::types::LedgerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplayError {
    /// Input file could not be opened
    #[error("Failed to open file '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A script line could not be turned into an operation
    #[error("Line {line}: {reason}")]
    Malformed { line: u64, reason: String },

    /// Reading or writing CSV failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The executor rejected an operation
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Clock advances only work on simulated time
    #[error("Cannot advance the wall clock")]
    RealClock,

    /// No operation script was given
    #[error("No input file given")]
    MissingInput,

    /// The async runtime could not be built or a worker panicked
    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Seed(#[from] SeedError),
}

impl ReplayError {
    /// Whether the replay may carry on with the next line
    pub fn is_line_error(&self) -> bool {
        matches!(
            self,
            ReplayError::Malformed { .. } | ReplayError::Ledger(_) | ReplayError::RealClock
        )
    }
}
