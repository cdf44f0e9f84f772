//! Error types for StashKV
//!
//! Provides a unified error type for all operations. A missing or expired
//! key is never an error: lookups return `Ok(None)`.

use thiserror::Error;

/// Result type alias using StashError
pub type Result<T> = std::result::Result<T, StashError>;

/// Unified error type for StashKV operations
#[derive(Debug, Error)]
pub enum StashError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    /// Underlying file I/O failed (disk full, permission denied, ...).
    /// Never retried internally.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    // -------------------------------------------------------------------------
    // Log Errors
    // -------------------------------------------------------------------------
    /// The log is damaged beyond a clean trailing truncation.
    #[error("Corrupt log: {0}")]
    CorruptLog(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Store is closed")]
    Closed,
}

impl StashError {
    /// Shorthand for rejecting a value the codec cannot represent
    pub fn unsupported(what: impl Into<String>) -> Self {
        StashError::UnsupportedType(what.into())
    }
}
