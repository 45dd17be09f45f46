// Error types for the ingest library
// The binary wraps these in anyhow; the library keeps them typed so callers
// can tell stream failures apart from sink failures.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the ingest library.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Reading the input stream (or a sink's file) failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Opening an input file failed.
    #[error("Failed to open input file {path}: {source}")]
    OpenInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// SQLite sink or query failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// CSV sink failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Print sink failed to serialize a record.
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// A sink was used after `flush` released its output.
    #[error("Sink '{0}' was already flushed")]
    SinkClosed(String),

    /// No unambiguous input file could be found.
    #[error("Input discovery failed: {0}")]
    Discovery(String),
}

/// Result type alias for ingest operations.
pub type Result<T> = std::result::Result<T, IngestError>;
