//! Error types for the portsweep-core library.

use thiserror::Error;

/// Result type alias for portsweep operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in configuration handling and at service seams.
///
/// Scan and kill operations never surface these to front ends; they are
/// folded into error rows and kill outcomes.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Every connection source failed.
    #[error("No connection source available (structured: {structured}; diagnostic: {diagnostic})")]
    SourcesUnavailable {
        structured: String,
        diagnostic: String,
    },
}
