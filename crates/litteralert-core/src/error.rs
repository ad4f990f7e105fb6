//! Error types for litteralert

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using litteralert's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for litteralert operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error on the history log or its lock file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The exclusive retention lock is held by another process
    #[error("History lock unavailable: {}", path.display())]
    Lock { path: PathBuf },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration sources could not be loaded or deserialized
    #[error("Configuration error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    /// Notification delivery failed for one or more recipients
    #[error("Dispatch failed for {failed} of {attempted} recipient(s)")]
    Dispatch { failed: usize, attempted: usize },

    /// A history row could not be parsed
    #[error("Malformed history row at line {line}: {reason}")]
    Format { line: u64, reason: String },

    /// CSV encoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Collaborator transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a format error for a given line of the log
    pub fn format(line: u64, reason: impl Into<String>) -> Self {
        Self::Format {
            line,
            reason: reason.into(),
        }
    }

    /// Whether this error means another process holds the retention lock
    pub fn is_lock_contention(&self) -> bool {
        matches!(self, Self::Lock { .. })
    }
}
