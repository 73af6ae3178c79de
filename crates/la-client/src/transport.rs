//! Byte-stream transports
//!
//! A [`Connector`] opens the full-duplex stream a connection runs over. The
//! serial connector talks to real hardware; [`StreamConnector`] wraps any
//! async stream, such as one end of a `tokio::io::duplex` pipe served by a
//! virtual analyzer.

use std::io;
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, StopBits};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::debug;

use crate::config::AnalyzerConfig;

/// Opens the byte stream for a connection
pub trait Connector: Send {
    /// Stream type produced by this connector
    type Io: AsyncRead + AsyncWrite + Send + 'static;

    /// Human-readable transport name, used in logs and errors
    fn describe(&self) -> String;

    /// Open a fresh stream
    fn open(&mut self) -> io::Result<Self::Io>;
}

/// Serial port transport, 8 data bits, no parity, 1 stop bit
#[derive(Debug, Clone)]
pub struct SerialConnector {
    port: String,
    baud_rate: u32,
    read_timeout: Duration,
}

impl SerialConnector {
    /// Create a connector for a port at the given baud rate
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        let defaults = AnalyzerConfig::default();
        Self {
            port: port.into(),
            baud_rate,
            read_timeout: defaults.read_timeout(),
        }
    }

    /// Create a connector from connection settings
    pub fn from_config(config: &AnalyzerConfig) -> Self {
        Self {
            port: config.port.clone(),
            baud_rate: config.baud_rate,
            read_timeout: config.read_timeout(),
        }
    }

    /// Serial port path
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Baud rate
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

impl Connector for SerialConnector {
    type Io = SerialStream;

    fn describe(&self) -> String {
        self.port.clone()
    }

    fn open(&mut self) -> io::Result<SerialStream> {
        debug!("Opening {} at {} baud (8N1)", self.port, self.baud_rate);
        let stream = tokio_serial::new(&self.port, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.read_timeout)
            .open_native_async()?;
        Ok(stream)
    }
}

/// Transport backed by an arbitrary async stream factory
pub struct StreamConnector<F> {
    label: String,
    open: F,
}

impl<F> StreamConnector<F> {
    /// Create a connector that calls `open` for every connection attempt
    pub fn new(label: impl Into<String>, open: F) -> Self {
        Self {
            label: label.into(),
            open,
        }
    }
}

impl<F, T> Connector for StreamConnector<F>
where
    F: FnMut() -> io::Result<T> + Send,
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    type Io = T;

    fn describe(&self) -> String {
        self.label.clone()
    }

    fn open(&mut self) -> io::Result<T> {
        (self.open)()
    }
}
