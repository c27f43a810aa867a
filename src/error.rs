use std::io;
use thiserror::Error;

/// Error type for CSV document operations.
#[derive(Error, Debug)]
pub enum CsvError {
    /// Caller-supplied configuration is invalid (control characters, open modes, offsets).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The document content does not have the expected shape (missing or duplicated header).
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// A numeric argument is outside the domain accepted by the accessor.
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// The underlying resource could not be opened.
    #[error("Stream unavailable: {0}")]
    StreamUnavailable(String),

    /// A record was rejected on the write path.
    #[error(transparent)]
    Insertion(#[from] InsertionError),

    /// The write-side filter chain changed after bytes were committed.
    #[error("Stream filter chain is locked: {0}")]
    StreamFilterLocked(String),

    /// IO error during document access.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// CSV tokenizer or serializer error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// A record that failed to be written.
///
/// Carries the offending record and, when a registered validator refused it,
/// the name that validator was registered under.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}{}", validator_suffix(.name))]
pub struct InsertionError {
    name: String,
    record: Vec<Option<String>>,
    reason: String,
}

impl InsertionError {
    /// A record refused by the validator registered as `name`.
    pub fn from_validator(name: impl Into<String>, record: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            record,
            reason: "Record validation failed".to_string(),
        }
    }

    /// A record that could not be serialized into the document.
    pub fn from_csv(record: Vec<Option<String>>, reason: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            record,
            reason: reason.into(),
        }
    }

    /// Name of the validator that refused the record, empty when no validator was involved.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The record as it was submitted to the validators.
    pub fn record(&self) -> &[Option<String>] {
        &self.record
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

fn validator_suffix(name: &str) -> String {
    if name.is_empty() {
        String::new()
    } else {
        format!(" (validator `{name}`)")
    }
}

/// Result type alias for CSV document operations.
pub type Result<T> = std::result::Result<T, CsvError>;
