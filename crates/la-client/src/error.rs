//! Error types for the analyzer client

use std::time::Duration;

use thiserror::Error;

/// Errors returned by connection-level operations
#[derive(Debug, Error)]
pub enum ClientError {
    /// The transport could not be opened
    #[error("failed to open {port}: {source}")]
    TransportOpen {
        /// Transport description (serial port name)
        port: String,
        #[source]
        source: std::io::Error,
    },

    /// Operation requires an active connection
    #[error("not connected to device")]
    NotConnected,

    /// `connect` called on a live connection
    #[error("already connected to device")]
    AlreadyConnected,

    /// Previously submitted commands are still unresolved
    #[error("connection is busy")]
    Busy,

    /// Submission without any command
    #[error("no commands submitted")]
    NoCommands,

    /// No or invalid reply to `IDENT`
    #[error("identification failed: {0}")]
    Identification(String),

    /// A submitted command failed
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Outcome of a single command that did not succeed
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Device answered `ERROR NN`
    ///
    /// `data` holds the tokens received for the command, the error token last.
    #[error("command failed on device: {code:02}")]
    Device { code: u8, data: Vec<String> },

    /// No `OK` or `ERROR` within the command timeout
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The transport failed while the command was pending
    #[error("transport failure: {0}")]
    Transport(String),

    /// The command was dropped from the queue before it resolved
    #[error("command abandoned before a response arrived")]
    Cancelled,
}
