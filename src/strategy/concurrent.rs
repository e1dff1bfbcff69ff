//! Concurrent replay
//!
//! Reads the script in batches and replays each batch on a multi-threaded
//! tokio runtime:
//!
//! ```text
//! script ──► batch ──► segments split at advance/tick
//!                          │
//!                          ├── partition by initiating account
//!                          │       ├── task: account 1 ops in file order
//!                          │       ├── task: account 2 ops in file order
//!                          │       └── ...
//!                          └── barrier op applied alone
//! ```
//!
//! Operations of one initiating account keep their file order. Operations of
//! different accounts race, and the store's optimistic commits keep every
//! interleaving consistent, so the final state may differ from a sequential
//! replay only where two accounts' operations depend on each other.

use crate::core::LedgerEngine;
use crate::io::csv_format::{account_rows, write_accounts_csv};
use crate::io::sync_reader::{OpReader, ScriptLine};
use crate::io::ReplayError;
use crate::strategy::{replay_line, ReplayStrategy, ReplaySummary};
use crate::types::AccountId;
use futures::future::join_all;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

/// Batch settings for concurrent replay
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Script lines read before the batch is replayed
    pub batch_size: usize,
    /// Runtime worker threads
    pub max_concurrent: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Build a config, falling back to defaults for zero values
    pub fn new(batch_size: usize, max_concurrent: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(default = default.batch_size, "batch_size of 0, using default");
            default.batch_size
        } else {
            batch_size
        };
        let max_concurrent = if max_concurrent == 0 {
            warn!(
                default = default.max_concurrent,
                "max_concurrent of 0, using default"
            );
            default.max_concurrent
        } else {
            max_concurrent
        };

        Self {
            batch_size,
            max_concurrent,
        }
    }
}

/// Parallel replay partitioned by initiating account
#[derive(Debug, Clone)]
pub struct ConcurrentReplay {
    config: BatchConfig,
}

impl ConcurrentReplay {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }
}

/// Group a segment's operations by the account that initiates them
///
/// Each group keeps the relative file order of its operations.
pub fn partition_by_account(segment: Vec<ScriptLine>) -> HashMap<AccountId, Vec<ScriptLine>> {
    let mut partitions: HashMap<AccountId, Vec<ScriptLine>> = HashMap::new();
    for line in segment {
        // Only barriers lack an initiator, and they never reach a segment.
        let key = line.operation.primary_account().unwrap_or_default();
        partitions.entry(key).or_default().push(line);
    }
    partitions
}

/// Replay a segment with one task per initiating account
async fn replay_segment(
    engine: &LedgerEngine,
    segment: Vec<ScriptLine>,
) -> Result<ReplaySummary, ReplayError> {
    let partitions = partition_by_account(segment);
    debug!(partitions = partitions.len(), "replaying segment");

    let tasks = partitions.into_values().map(|lines| {
        let engine = engine.clone();
        tokio::spawn(async move {
            let mut summary = ReplaySummary::default();
            for line in &lines {
                replay_line(&engine, line, &mut summary);
            }
            summary
        })
    });

    let mut summary = ReplaySummary::default();
    for joined in join_all(tasks).await {
        let partial = joined.map_err(|error| ReplayError::Runtime(error.to_string()))?;
        summary.merge(partial);
    }
    Ok(summary)
}

/// Replay a batch: segments run in parallel, barriers run alone in order
async fn replay_batch(
    engine: &LedgerEngine,
    batch: Vec<ScriptLine>,
) -> Result<ReplaySummary, ReplayError> {
    let mut summary = ReplaySummary::default();
    let mut segment = Vec::new();

    for line in batch {
        if line.operation.is_barrier() {
            summary.merge(replay_segment(engine, std::mem::take(&mut segment)).await?);
            replay_line(engine, &line, &mut summary);
        } else {
            segment.push(line);
        }
    }
    summary.merge(replay_segment(engine, segment).await?);
    Ok(summary)
}

impl ReplayStrategy for ConcurrentReplay {
    fn process(
        &self,
        engine: &LedgerEngine,
        input_path: &Path,
        output: &mut dyn Write,
    ) -> Result<ReplaySummary, ReplayError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent)
            .build()
            .map_err(|error| ReplayError::Runtime(error.to_string()))?;

        let summary = runtime.block_on(async {
            let mut reader = OpReader::open(input_path)?;
            let mut summary = ReplaySummary::default();

            loop {
                let mut batch = Vec::with_capacity(self.config.batch_size);
                let mut read = 0;
                for result in reader.by_ref().take(self.config.batch_size) {
                    read += 1;
                    match result {
                        Ok(line) => batch.push(line),
                        Err(error) if error.is_line_error() => summary.record_malformed(&error),
                        Err(error) => return Err(error),
                    }
                }
                if read == 0 {
                    break;
                }
                // The next batch starts only after this one is fully applied.
                summary.merge(replay_batch(engine, batch).await?);
            }
            Ok::<_, ReplayError>(summary)
        })?;

        info!(
            applied = summary.applied,
            rejected = summary.rejected,
            malformed = summary.malformed,
            workers = self.config.max_concurrent,
            "concurrent replay finished"
        );
        write_accounts_csv(&account_rows(engine.store()), output)?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::fixtures::{engine, script};
    use crate::strategy::SequentialReplay;
    use crate::types::Operation;
    use rust_decimal_macros::dec;

    fn line(line: u64, operation: Operation) -> ScriptLine {
        ScriptLine { line, operation }
    }

    fn transfer(sender: AccountId, recipient: AccountId, amount: i64) -> Operation {
        Operation::Transfer {
            sender,
            recipient,
            amount: rust_decimal::Decimal::new(amount, 0),
        }
    }

    #[test]
    fn test_batch_config_zero_values_fall_back() {
        let config = BatchConfig::new(0, 0);
        assert_eq!(config, BatchConfig::default());
        assert_eq!(BatchConfig::new(5, 2).batch_size, 5);
    }

    #[test]
    fn test_partition_keeps_per_account_order() {
        let partitions = partition_by_account(vec![
            line(2, transfer(1, 2, 10)),
            line(3, transfer(2, 1, 5)),
            line(4, transfer(1, 3, 20)),
            line(
                5,
                Operation::PlaceBid {
                    account: 1,
                    amount: dec!(7),
                },
            ),
        ]);

        assert_eq!(partitions.len(), 2);
        let lines: Vec<_> = partitions[&1].iter().map(|line| line.line).collect();
        assert_eq!(lines, vec![2, 4, 5]);
        assert_eq!(partitions[&2].len(), 1);
    }

    #[test]
    fn test_independent_accounts_match_sequential() {
        let body = "deposit,1,,200,,\n\
                    buy,3,,,ACME,2\n\
                    loan,2,,400,,\n\
                    transfer,1,2,100,,\n\
                    advance,,,24,,\n\
                    tick,,,,,\n\
                    sell,3,,,ACME,1\n\
                    repay,2,,150,,\n";
        let file = script(body);

        let (sequential_engine, _) = engine();
        let mut sequential = Vec::new();
        SequentialReplay
            .process(&sequential_engine, file.path(), &mut sequential)
            .unwrap();

        let (concurrent_engine, _) = engine();
        let mut concurrent = Vec::new();
        let summary = ConcurrentReplay::new(BatchConfig::new(3, 4))
            .process(&concurrent_engine, file.path(), &mut concurrent)
            .unwrap();

        assert_eq!(summary.applied, 8);
        assert_eq!(
            String::from_utf8(concurrent).unwrap(),
            String::from_utf8(sequential).unwrap()
        );
    }

    #[test]
    fn test_contending_transfers_conserve_total() {
        let mut body = String::new();
        for round in 0..40 {
            let (sender, recipient) = match round % 3 {
                0 => (1, 2),
                1 => (2, 3),
                _ => (3, 1),
            };
            body.push_str(&format!("transfer,{},{},7,,\n", sender, recipient));
        }
        let file = script(&body);
        let (engine, _) = engine();
        let before = engine.store().total_balance();

        let summary = ConcurrentReplay::new(BatchConfig::new(16, 4))
            .process(&engine, file.path(), &mut Vec::new())
            .unwrap();

        assert_eq!(summary.applied + summary.rejected, 40);
        assert_eq!(engine.store().total_balance(), before);
        for account in engine.store().accounts() {
            assert!(account.balance >= rust_decimal::Decimal::ZERO);
            let ledger_sum: rust_decimal::Decimal = engine
                .store()
                .ledger_for(account.id)
                .iter()
                .map(|entry| entry.signed_amount())
                .sum();
            assert_eq!(ledger_sum, account.balance);
        }
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let (engine, _) = engine();
        let error = ConcurrentReplay::new(BatchConfig::default())
            .process(&engine, Path::new("missing-ops.csv"), &mut Vec::new())
            .unwrap_err();
        assert!(matches!(error, ReplayError::Open { .. }));
    }
}
