//! Sequential replay
//!
//! Streams the script one row at a time and applies each operation in file
//! order, so the outcome is fully determined by the script, the seed and
//! the drift RNG seed.

use crate::core::LedgerEngine;
use crate::io::csv_format::{account_rows, write_accounts_csv};
use crate::io::sync_reader::OpReader;
use crate::io::ReplayError;
use crate::strategy::{replay_line, ReplayStrategy, ReplaySummary};
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Single-threaded replay in file order
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialReplay;

impl ReplayStrategy for SequentialReplay {
    fn process(
        &self,
        engine: &LedgerEngine,
        input_path: &Path,
        output: &mut dyn Write,
    ) -> Result<ReplaySummary, ReplayError> {
        let reader = OpReader::open(input_path)?;
        let mut summary = ReplaySummary::default();

        for result in reader {
            match result {
                Ok(line) => replay_line(engine, &line, &mut summary),
                Err(error) if error.is_line_error() => summary.record_malformed(&error),
                Err(error) => return Err(error),
            }
        }

        info!(
            applied = summary.applied,
            rejected = summary.rejected,
            malformed = summary.malformed,
            "sequential replay finished"
        );
        write_accounts_csv(&account_rows(engine.store()), output)?;
        Ok(summary)
    }
}
