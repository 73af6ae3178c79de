//! Error types for protocol parsing

use thiserror::Error;

/// Errors that can occur while interpreting response data
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Reply did not carry the expected number of data tokens
    #[error("expected {expected} token(s), got {actual}")]
    UnexpectedTokenCount { expected: usize, actual: usize },

    /// Identification token did not match `<model> V<version>`
    #[error("invalid identification: {0}")]
    InvalidIdentification(String),

    /// Model name is not a known analyzer
    #[error("unknown model: {0}")]
    UnknownModel(String),
}
