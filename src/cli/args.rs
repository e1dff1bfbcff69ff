use crate::strategy::BatchConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Replay banking operations against a simulated ledger
#[derive(Parser, Debug)]
#[command(name = "bank-ledger")]
#[command(
    about = "Replay banking operations against a simulated ledger, or serve a live one",
    long_about = None
)]
pub struct CliArgs {
    /// Operation script to replay
    #[arg(
        value_name = "OPS_CSV",
        required_unless_present = "serve",
        help = "Path to the operations CSV file"
    )]
    pub input_file: Option<PathBuf>,

    /// Engine configuration file
    #[arg(long = "config", value_name = "FILE", help = "Engine configuration TOML")]
    pub config: Option<PathBuf>,

    /// World seed file
    #[arg(long = "seed", value_name = "FILE", help = "World seed TOML")]
    pub seed: Option<PathBuf>,

    /// How operations are replayed
    #[arg(
        long = "mode",
        value_name = "MODE",
        default_value = "sequential",
        help = "Replay mode: 'sequential' or 'concurrent'"
    )]
    pub mode: ReplayMode,

    /// Operations per batch (concurrent mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Operations read per batch in concurrent mode (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Worker threads (concurrent mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Worker threads in concurrent mode (default: CPU cores)"
    )]
    pub max_concurrent: Option<usize>,

    /// Run settlement on the wall clock until interrupted
    #[arg(
        long = "serve",
        conflicts_with = "input_file",
        help = "Run the settlement scheduler until Ctrl-C, then print accounts"
    )]
    pub serve: bool,

    /// Fixed seed for market drift
    #[arg(long = "rng-seed", value_name = "N", help = "Seed for price drift randomness")]
    pub rng_seed: Option<u64>,

    /// Log filter, overrides RUST_LOG
    #[arg(
        long = "log-level",
        value_name = "LEVEL",
        help = "Log filter such as 'debug' (default: RUST_LOG or 'info')"
    )]
    pub log_level: Option<String>,
}

/// How a script is fed to the executor
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReplayMode {
    /// One operation at a time in file order
    Sequential,
    /// Accounts replayed in parallel between clock barriers
    Concurrent,
}

impl CliArgs {
    /// Batch settings for concurrent mode, defaults for anything not given
    pub fn to_batch_config(&self) -> BatchConfig {
        let default = BatchConfig::default();
        BatchConfig::new(
            self.batch_size.unwrap_or(default.batch_size),
            self.max_concurrent.unwrap_or(default.max_concurrent),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::default_mode(&["bank-ledger", "ops.csv"], ReplayMode::Sequential)]
    #[case::sequential(&["bank-ledger", "--mode", "sequential", "ops.csv"], ReplayMode::Sequential)]
    #[case::concurrent(&["bank-ledger", "--mode", "concurrent", "ops.csv"], ReplayMode::Concurrent)]
    fn test_mode_parsing(#[case] args: &[&str], #[case] expected: ReplayMode) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.mode, expected);
    }

    #[test]
    fn test_all_options() {
        let parsed = CliArgs::try_parse_from([
            "bank-ledger",
            "--config",
            "engine.toml",
            "--seed",
            "world.toml",
            "--mode",
            "concurrent",
            "--batch-size",
            "50",
            "--max-concurrent",
            "3",
            "--rng-seed",
            "42",
            "--log-level",
            "debug",
            "ops.csv",
        ])
        .unwrap();

        assert_eq!(parsed.input_file, Some(PathBuf::from("ops.csv")));
        assert_eq!(parsed.config, Some(PathBuf::from("engine.toml")));
        assert_eq!(parsed.seed, Some(PathBuf::from("world.toml")));
        assert_eq!(parsed.rng_seed, Some(42));
        assert_eq!(parsed.log_level.as_deref(), Some("debug"));
        assert!(!parsed.serve);

        let batch = parsed.to_batch_config();
        assert_eq!(batch.batch_size, 50);
        assert_eq!(batch.max_concurrent, 3);
    }

    #[test]
    fn test_serve_needs_no_input() {
        let parsed = CliArgs::try_parse_from(["bank-ledger", "--serve", "--seed", "w.toml"]).unwrap();
        assert!(parsed.serve);
        assert!(parsed.input_file.is_none());
    }

    #[rstest]
    #[case::defaults(&["bank-ledger", "ops.csv"], 1000, num_cpus::get())]
    #[case::zero_batch_size(&["bank-ledger", "--batch-size", "0", "ops.csv"], 1000, num_cpus::get())]
    #[case::zero_workers(&["bank-ledger", "--max-concurrent", "0", "ops.csv"], 1000, num_cpus::get())]
    #[case::custom(&["bank-ledger", "--batch-size", "7", "--max-concurrent", "2", "ops.csv"], 7, 2)]
    fn test_batch_config_conversion(
        #[case] args: &[&str],
        #[case] batch_size: usize,
        #[case] max_concurrent: usize,
    ) {
        let config = CliArgs::try_parse_from(args).unwrap().to_batch_config();
        assert_eq!(config.batch_size, batch_size);
        assert_eq!(config.max_concurrent, max_concurrent);
    }

    #[rstest]
    #[case::missing_input(&["bank-ledger"])]
    #[case::invalid_mode(&["bank-ledger", "--mode", "parallel", "ops.csv"])]
    #[case::serve_with_input(&["bank-ledger", "--serve", "ops.csv"])]
    #[case::bad_rng_seed(&["bank-ledger", "--rng-seed", "abc", "ops.csv"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        assert!(CliArgs::try_parse_from(args).is_err());
    }
}
