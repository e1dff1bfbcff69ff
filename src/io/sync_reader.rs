//! Streaming reader over operation scripts
//!
//! [`OpReader`] yields one [`ScriptLine`] per CSV row, tagged with the line
//! it came from. A row that cannot be parsed is yielded as
//! [`ReplayError::Malformed`] and reading continues with the next row; only
//! an I/O failure ends the iteration.
//!
//! ```no_run
//! use bank_ledger_engine::io::sync_reader::OpReader;
//! use std::path::Path;
//!
//! let reader = OpReader::open(Path::new("ops.csv")).unwrap();
//! for line in reader.filter_map(Result::ok) {
//!     println!("{}: {}", line.line, line.operation.name());
//! }
//! ```

use crate::io::csv_format::{convert_op_record, OpRecord};
use crate::io::error::ReplayError;
use crate::types::Operation;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// An operation and the script line it was read from
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptLine {
    pub line: u64,
    pub operation: Operation,
}

/// Iterator over the operations of a script
#[derive(Debug)]
pub struct OpReader<R> {
    reader: csv::Reader<R>,
    headers: StringRecord,
    record: StringRecord,
    finished: bool,
}

impl OpReader<File> {
    /// Open a script file
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or its header row cannot be read.
    pub fn open(path: &Path) -> Result<Self, ReplayError> {
        let file = File::open(path).map_err(|source| ReplayError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_reader(file)
    }
}

impl<R: Read> OpReader<R> {
    /// Read a script from any byte source
    pub fn from_reader(source: R) -> Result<Self, ReplayError> {
        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(source);
        let headers = reader.headers()?.clone();

        Ok(Self {
            reader,
            headers,
            record: StringRecord::new(),
            finished: false,
        })
    }

    fn parse_current(&self) -> Result<ScriptLine, ReplayError> {
        let line = self
            .record
            .position()
            .map_or(0, |position| position.line());
        let malformed = |reason: String| ReplayError::Malformed { line, reason };

        let raw: OpRecord = self
            .record
            .deserialize(Some(&self.headers))
            .map_err(|error| malformed(error.to_string()))?;
        let operation = convert_op_record(raw).map_err(malformed)?;
        Ok(ScriptLine { line, operation })
    }
}

impl<R: Read> Iterator for OpReader<R> {
    type Item = Result<ScriptLine, ReplayError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.reader.read_record(&mut self.record) {
            Ok(false) => {
                self.finished = true;
                None
            }
            Ok(true) => Some(self.parse_current()),
            Err(error) if error.is_io_error() => {
                self.finished = true;
                Some(Err(ReplayError::Csv(error)))
            }
            Err(error) => Some(Err(ReplayError::Malformed {
                line: error.position().map_or(0, |position| position.line()),
                reason: error.to_string(),
            })),
        }
    }
}
