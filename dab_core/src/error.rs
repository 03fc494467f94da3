//! Error types for the dab_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for dab_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The session log (or another file) could not be read or written
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] io::Error),

    /// CSV encoding/decoding error
    #[error("CSV error: {0}")]
    Csv(csv::Error),

    /// The log's first row is not the expected column list
    #[error("Unexpected log header: {0}")]
    UnexpectedHeader(String),

    /// A log row was readable as CSV but not as a session record
    #[error("Corrupt record at row {row}: {reason}")]
    CorruptRecord { row: usize, reason: String },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Category name missing from the configured duration tables
    #[error("Unknown {kind}: '{name}'")]
    UnknownCategory { kind: &'static str, name: String },

    /// `start` called while a countdown is in progress
    #[error("Timer is already running")]
    AlreadyRunning,

    /// Rating/delete targeted a row that does not exist
    #[error("Index {index} out of range (log has {len} records)")]
    IndexOutOfRange { index: usize, len: usize },

    /// Rating outside 1-5
    #[error("Invalid rating '{0}': expected 1-5")]
    InvalidRating(String),

    /// Intensity outside the accepted range
    #[error("Invalid intensity {0}: expected {min:.1}-{max:.1}", min = crate::types::MIN_INTENSITY, max = crate::types::MAX_INTENSITY)]
    InvalidIntensity(f64),
}

impl From<csv::Error> for Error {
    /// I/O failures surfaced by the csv reader/writer count as storage errors
    fn from(err: csv::Error) -> Self {
        if !err.is_io_error() {
            return Error::Csv(err);
        }
        match err.into_kind() {
            csv::ErrorKind::Io(e) => Error::StorageUnavailable(e),
            other => Error::StorageUnavailable(io::Error::new(
                io::ErrorKind::Other,
                format!("{:?}", other),
            )),
        }
    }
}
