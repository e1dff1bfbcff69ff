// CLI module
// Command-line arguments of the bank-ledger binary

mod args;

pub use args::{CliArgs, ReplayMode};

use clap::Parser;

/// Parse the process arguments
///
/// On invalid arguments or `--help`, clap prints the message and exits.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}
