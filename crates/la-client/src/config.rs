//! Connection configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Baud rate the analyzers ship with
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default time a command may wait for its `OK`/`ERROR`
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Serial read timeout in milliseconds
const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;

fn default_baud() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_read_timeout_ms() -> u64 {
    DEFAULT_READ_TIMEOUT_MS
}

fn default_command_timeout_ms() -> u64 {
    DEFAULT_COMMAND_TIMEOUT.as_millis() as u64
}

/// Connection settings for a serial-attached analyzer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalyzerConfig {
    /// Serial port path (e.g. `/dev/ttyUSB0`, `COM9`)
    #[serde(default)]
    pub port: String,
    /// Baud rate
    #[serde(default = "default_baud")]
    pub baud_rate: u32,
    /// Serial read timeout in milliseconds
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Per-command response timeout in milliseconds
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            command_timeout_ms: default_command_timeout_ms(),
        }
    }
}

impl AnalyzerConfig {
    /// Create a configuration for the given port with default settings
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Default::default()
        }
    }

    /// Serial read timeout
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Per-command response timeout
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}
