//! I/O module
//!
//! Everything that touches files: operation scripts in, account reports
//! out, and the TOML world seed.
//!
//! # Components
//!
//! - `csv_format` - Script row conversion and report serialization
//! - `sync_reader` - Streaming reader over operation scripts
//! - `seed` - World seed loading and installation
//! - `error` - Replay error type

pub mod csv_format;
pub mod error;
pub mod seed;
pub mod sync_reader;

pub use csv_format::{account_rows, convert_op_record, write_accounts_csv, AccountRow, OpRecord};
pub use error::ReplayError;
pub use seed::{AccountSeed, AuctionSeed, SeedError, WorldSeed};
pub use sync_reader::{OpReader, ScriptLine};
