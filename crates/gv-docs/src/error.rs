use std::io;
use std::path::PathBuf;

/// Errors produced by the document store and its backings.
#[derive(Debug, thiserror::Error)]
pub enum DocsError {
    /// I/O error while reading or writing the backing file.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The backing file holds something other than an id → document map.
    #[error("malformed document file {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    /// Serialization failure while flushing.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The backing could not be reached (e.g. a poisoned lock).
    #[error("backing unavailable: {0}")]
    Unavailable(String),
}

/// Convenience alias used throughout the docs crate.
pub type Result<T> = std::result::Result<T, DocsError>;
