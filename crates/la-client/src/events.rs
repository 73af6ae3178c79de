//! Event stream for connection observers
//!
//! Lifecycle changes, raw traffic and protocol anomalies are broadcast on a
//! single channel so a traffic monitor sees everything in order.

use crate::state::DeviceInfo;

/// Events emitted by a [`LogicAnalyzer`](crate::LogicAnalyzer)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyzerEvent {
    // -------------------------------------------------------------------------
    // Lifecycle events
    // -------------------------------------------------------------------------
    /// Identification succeeded and the connection is usable
    Connected(DeviceInfo),

    /// The connection was closed
    Disconnected,

    /// The transport failed; every pending command was failed with it
    TransportFailed(String),

    // -------------------------------------------------------------------------
    // Traffic events (for traffic monitor)
    // -------------------------------------------------------------------------
    /// Raw bytes read from the device
    DataIn(Vec<u8>),

    /// Command bytes written to the device
    DataOut(Vec<u8>),

    /// Tokens received while no command was pending
    ExcessData(Vec<String>),
}
