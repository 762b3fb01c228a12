//! Error types for the herald-ledger crate.
//!
//! Ledger failures are reported to the dispatch loop, which logs them and keeps
//! going: losing a ledger row never aborts a run.

use std::io;

use thiserror::Error;

/// Top-level ledger error type.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// I/O operation failed (file read/write/rename).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// Ledger location validation failed.
    #[error("Ledger validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Serialization and deserialization errors.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Ledger directory validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Path contains `..` components.
    #[error("Ledger path cannot contain '..' components: {0}")]
    ParentTraversal(String),

    /// Path points into a system directory.
    #[error("Ledger path cannot be in system directory {prefix}: {path}")]
    SystemDirectory { prefix: &'static str, path: String },

    /// Path exists but is not a directory.
    #[error("Ledger path is not a directory: {0}")]
    NotDirectory(String),
}

/// Specialized `Result` type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(SerializationError::Json(e))
    }
}
