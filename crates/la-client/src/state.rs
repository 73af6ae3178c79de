//! Connection state

use std::fmt;

use la_protocol::Identification;

/// Identity of a connected analyzer, as reported by `IDENT`
pub type DeviceInfo = Identification;

/// Where a connection is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport open
    #[default]
    Disconnected,
    /// Opening the transport
    Connecting,
    /// Transport open, waiting for the `IDENT` reply
    Identifying,
    /// Identified and ready for commands
    Connected(DeviceInfo),
}

impl ConnectionState {
    /// Identity of the device when connected
    pub fn device_info(&self) -> Option<&DeviceInfo> {
        match self {
            ConnectionState::Connected(info) => Some(info),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Identifying => f.write_str("identifying"),
            ConnectionState::Connected(info) => write!(f, "connected to {}", info),
        }
    }
}
