//! Replay strategies
//!
//! A strategy reads an operation script, feeds every operation to a
//! [`LedgerEngine`] and writes the final accounts report. Rejected and
//! malformed lines are logged and skipped; only I/O failures end a replay
//! early.

use crate::cli::ReplayMode;
use crate::core::{
    BidReceipt, CheckoutReceipt, LedgerEngine, LoanDecision, RepaymentReceipt, SettlementReport,
    TradeReceipt, TransferReceipt,
};
use crate::io::{ReplayError, ScriptLine};
use crate::types::{Deposit, InsurancePolicy, LedgerError, Operation};
use chrono::{DateTime, Duration, Utc};
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

pub mod concurrent;
pub mod sequential;

pub use concurrent::{BatchConfig, ConcurrentReplay};
pub use sequential::SequentialReplay;

/// Feeds an operation script through an engine
pub trait ReplayStrategy: Send + Sync {
    /// Replay `input_path` against `engine` and write the accounts report to
    /// `output`
    ///
    /// # Errors
    ///
    /// Returns an error only when the script cannot be read or the report
    /// cannot be written. Per-line failures are counted in the summary.
    fn process(
        &self,
        engine: &LedgerEngine,
        input_path: &Path,
        output: &mut dyn Write,
    ) -> Result<ReplaySummary, ReplayError>;
}

/// Pick the strategy for a replay mode
pub fn create_strategy(mode: ReplayMode, config: BatchConfig) -> Box<dyn ReplayStrategy> {
    match mode {
        ReplayMode::Sequential => Box::new(SequentialReplay),
        ReplayMode::Concurrent => Box::new(ConcurrentReplay::new(config)),
    }
}

/// Line counts of a finished replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Operations that committed
    pub applied: usize,
    /// Operations the engine refused
    pub rejected: usize,
    /// Lines that could not be parsed
    pub malformed: usize,
}

impl ReplaySummary {
    /// Account for one applied or refused operation
    pub(crate) fn record(&mut self, line: u64, name: &str, result: Result<Outcome, ReplayError>) {
        match result {
            Ok(outcome) => {
                self.applied += 1;
                debug!(line, operation = name, ?outcome, "operation applied");
            }
            Err(error) => {
                self.rejected += 1;
                warn!(line, operation = name, %error, "operation rejected");
            }
        }
    }

    /// Account for a line that failed to parse
    pub(crate) fn record_malformed(&mut self, error: &ReplayError) {
        self.malformed += 1;
        warn!(%error, "skipping malformed line");
    }

    pub(crate) fn merge(&mut self, other: ReplaySummary) {
        self.applied += other.applied;
        self.rejected += other.rejected;
        self.malformed += other.malformed;
    }
}

/// What a replayed operation produced
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Transfer(TransferReceipt),
    Checkout(CheckoutReceipt),
    Deposit(Deposit),
    Loan(LoanDecision),
    Repayment(RepaymentReceipt),
    Insurance(InsurancePolicy),
    Bid(BidReceipt),
    Trade(TradeReceipt),
    Advanced(DateTime<Utc>),
    Settled(SettlementReport),
}

/// Run one operation against the engine
pub fn apply(engine: &LedgerEngine, operation: &Operation) -> Result<Outcome, ReplayError> {
    let executor = engine.executor();
    let outcome = match operation {
        Operation::Transfer {
            sender,
            recipient,
            amount,
        } => Outcome::Transfer(executor.transfer(*sender, *recipient, *amount)?),
        Operation::Checkout {
            account,
            cart,
            loyalty_points,
        } => Outcome::Checkout(executor.checkout(*account, cart, *loyalty_points)?),
        Operation::OpenDeposit { account, amount } => {
            Outcome::Deposit(executor.open_deposit(*account, *amount)?)
        }
        Operation::RequestLoan { account, amount } => {
            Outcome::Loan(executor.request_loan(*account, *amount)?)
        }
        Operation::RepayLoan { account, amount } => {
            Outcome::Repayment(executor.repay_loan(*account, *amount)?)
        }
        Operation::BuyInsurance { account, option } => {
            Outcome::Insurance(executor.buy_insurance(*account, *option)?)
        }
        Operation::PlaceBid { account, amount } => {
            Outcome::Bid(executor.place_bid(*account, *amount)?)
        }
        Operation::Trade {
            account,
            ticker,
            quantity,
            direction,
        } => Outcome::Trade(executor.trade(*account, ticker, *quantity, *direction)?),
        Operation::Advance { hours } => {
            let span = Duration::try_hours(*hours)
                .ok_or_else(|| LedgerError::invalid_duration(&format!("{}h", hours)))?;
            Outcome::Advanced(engine.advance(span)?.ok_or(ReplayError::RealClock)?)
        }
        Operation::Tick => Outcome::Settled(engine.tick()?),
    };
    Ok(outcome)
}

/// Apply a script line and count the result
pub(crate) fn replay_line(engine: &LedgerEngine, line: &ScriptLine, summary: &mut ReplaySummary) {
    let result = apply(engine, &line.operation);
    summary.record(line.line, line.operation.name(), result);
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::config::EngineConfig;
    use crate::core::{LedgerEngine, Outbox};
    use crate::io::WorldSeed;
    use chrono::{TimeZone, Utc};
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    pub const HEADER: &str = "op,account,counterparty,amount,target,quantity\n";

    /// Simulated engine with alice (500), bob (100) and carol (1000), ACME
    /// at 100 and an open-ended auction
    pub fn engine() -> (LedgerEngine, Arc<Outbox>) {
        let outbox = Arc::new(Outbox::new());
        let engine = LedgerEngine::simulated(
            EngineConfig::default(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            outbox.clone(),
            Some(11),
        );
        WorldSeed::from_toml(
            r#"
            [[accounts]]
            handle = "alice"
            balance = 500
            [[accounts]]
            handle = "bob"
            balance = 100
            [[accounts]]
            handle = "carol"
            balance = 1000
            [[assets]]
            ticker = "ACME"
            category = "company"
            price = "100"
            [auction]
            lot = "Painting"
            "#,
        )
        .unwrap()
        .apply(engine.executor())
        .unwrap();
        (engine, outbox)
    }

    pub fn script(body: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(HEADER.as_bytes()).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }
}
