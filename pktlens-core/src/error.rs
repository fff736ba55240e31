//! Error types for pktlens-core.
//!
//! This module provides structured error types for all pktlens-core operations:
//!
//! - [`enum@Error`] - Main error enum that wraps all error types
//! - [`RuleSyntaxError`] - Errors from compiling rule text
//! - [`StoreError`] - Errors from creating or exporting packet stores
//!
//! Decoding itself never fails: truncated or malformed packets produce partial
//! fields instead of errors.

use thiserror::Error;

/// Main error type for pktlens-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Rule text could not be compiled
    #[error("Rule syntax error: {0}")]
    Rules(#[from] RuleSyntaxError),

    /// Packet store could not be created or exported
    #[error("Packet store error: {0}")]
    Store(#[from] StoreError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A problem found while compiling rule text.
///
/// `line` is 1-based and points at the offending rule line (for an
/// unterminated switch, the line that opened it).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct RuleSyntaxError {
    pub line: usize,
    pub message: String,
}

impl RuleSyntaxError {
    /// Create a syntax error for a rule line.
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Errors related to packet store creation and export.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The ingestion collaborator reported a failure
    #[error("Failed to load {origin}: {reason}")]
    IngestionFailure { origin: String, reason: String },

    /// Ingestion succeeded but produced no packets
    #[error("{origin} contains no useful data")]
    NoUsefulData { origin: String },

    /// The operation needs every loaded packet to be decoded first
    #[error("Packet store is not pre-parsed")]
    NotPreParsed,
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RuleSyntaxError::new(7, "unknown field type `u24`");
        assert_eq!(err.to_string(), "line 7: unknown field type `u24`");

        let err = StoreError::NoUsefulData {
            origin: "session.log".to_string(),
        };
        assert_eq!(err.to_string(), "session.log contains no useful data");

        let err: Error = RuleSyntaxError::new(1, "bad").into();
        assert_eq!(err.to_string(), "Rule syntax error: line 1: bad");
    }
}
