use std::path::PathBuf;

use thiserror::Error;

/// Failures that stop a reconciliation run or a table import.
///
/// Per-key lookup failures never show up here: they are folded into
/// [`crate::lookup::LookupOutcome`] and classified like any other result.
#[derive(Error, Debug)]
pub enum ReconError {
    #[error("No source file matches pattern '{0}'")]
    SourceNotFound(String),

    #[error("Invalid source pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Missing required configuration value {0}")]
    ConfigurationMissing(&'static str),

    #[error("Invalid configuration value for {name}: {reason}")]
    InvalidConfiguration { name: &'static str, reason: String },

    #[error("Column '{0}' not found in source")]
    MissingColumn(String),

    #[error("Failed to read source {path}: {source}")]
    SourceRead {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, ReconError>;

/// Failures raised by the table store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Row {row} of table '{table}' has {found} values, expected {expected}")]
    RowWidth {
        table: String,
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}
