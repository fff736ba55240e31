//! Error types for the pktlens command-line front end.

use thiserror::Error;

/// Errors raised while reading a text packet log.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    /// A line that does not follow the packet log layout
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

impl LogError {
    pub fn malformed(line: usize, reason: impl Into<String>) -> Self {
        LogError::Malformed {
            line,
            reason: reason.into(),
        }
    }
}

/// Errors raised while turning command-line values into core types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgError {
    /// Packet type ids are decimal or `0x`-prefixed hex, up to 0xFFFF
    #[error("invalid packet type `{0}`")]
    PacketType(String),

    /// Byte patterns are pairs of hex digits
    #[error("invalid hex bytes `{0}`")]
    HexBytes(String),

    /// Field matches are written `NAME=VALUE`
    #[error("invalid field match `{0}`, expected NAME=VALUE")]
    FieldMatch(String),
}

/// Result type alias for log reading.
pub type Result<T> = std::result::Result<T, LogError>;
