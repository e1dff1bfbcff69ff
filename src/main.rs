//! Bank Ledger CLI
//!
//! Replays an operation script against a simulated ledger, or serves a live
//! ledger whose settlement runs on the wall clock.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --seed world.toml ops.csv > accounts.csv
//! cargo run -- --seed world.toml --mode concurrent --max-concurrent 8 ops.csv > accounts.csv
//! cargo run -- --config engine.toml --seed world.toml --rng-seed 7 ops.csv
//! cargo run -- --seed world.toml --serve > accounts.csv
//! ```
//!
//! The final accounts report goes to stdout; logs go to stderr.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (unreadable config, seed or script, failed output, etc.)

use bank_ledger_engine::cli::{self, CliArgs};
use bank_ledger_engine::config::EngineConfig;
use bank_ledger_engine::core::{LedgerEngine, LogSink};
use bank_ledger_engine::io::{account_rows, write_accounts_csv, ReplayError, WorldSeed};
use bank_ledger_engine::strategy;
use chrono::Utc;
use std::process;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    let args = cli::parse_args();
    init_tracing(args.log_level.as_deref());

    if let Err(error) = run(args) {
        error!(%error, "bank-ledger failed");
        process::exit(1);
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: CliArgs) -> Result<(), ReplayError> {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let seed = match &args.seed {
        Some(path) => WorldSeed::load(path)?,
        None => WorldSeed::default(),
    };

    if args.serve {
        let engine = LedgerEngine::live(config, Arc::new(LogSink), args.rng_seed);
        seed.apply(engine.executor())?;
        serve(&engine)?;
        write_accounts_csv(&account_rows(engine.store()), &mut std::io::stdout())?;
        return Ok(());
    }

    let input = args.input_file.as_deref().ok_or(ReplayError::MissingInput)?;
    let engine = LedgerEngine::simulated(config, Utc::now(), Arc::new(LogSink), args.rng_seed);
    seed.apply(engine.executor())?;

    let strategy = strategy::create_strategy(args.mode, args.to_batch_config());
    let summary = strategy.process(&engine, input, &mut std::io::stdout())?;
    info!(
        applied = summary.applied,
        rejected = summary.rejected,
        malformed = summary.malformed,
        "replay complete"
    );
    Ok(())
}

/// Run the settlement scheduler until Ctrl-C
fn serve(engine: &LedgerEngine) -> Result<(), ReplayError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|error| ReplayError::Runtime(error.to_string()))?;

    runtime.block_on(async {
        let scheduler = engine.scheduler();
        let cancel = CancellationToken::new();
        let handle = scheduler.spawn(cancel.clone());
        info!("serving, press Ctrl-C to stop");

        tokio::signal::ctrl_c().await?;
        cancel.cancel();
        handle
            .await
            .map_err(|error| ReplayError::Runtime(error.to_string()))?;

        info!(
            committed = scheduler.committed_ticks(),
            failed = scheduler.failed_ticks(),
            "shut down"
        );
        Ok::<_, ReplayError>(())
    })
}
