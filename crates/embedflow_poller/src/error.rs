//! Error types for the poller

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Poller error type
#[derive(Error, Debug)]
pub enum PollerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Failed to copy '{}' to '{}': {error}", from.display(), to.display())]
    Download {
        from: PathBuf,
        to: PathBuf,
        #[source]
        error: io::Error,
    },

    #[error("Executor notification failed: {0}")]
    Notify(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, PollerError>;
