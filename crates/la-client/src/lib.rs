//! LA4800 Client Driver
//!
//! This crate drives an LA4800 or LA3200 logic analyzer over a serial line.
//! It opens the transport, identifies the device, and correlates each
//! submitted command with its response.
//!
//! # Architecture
//!
//! Every open connection runs two tasks:
//! - A link actor that reads continuously, decodes `\r`-terminated blocks and
//!   resolves pending commands in submission order
//! - A transmit task that writes the command at the head of the queue
//!
//! Only one command is on the wire at a time; the next is transmitted once
//! the previous one resolves or times out. All activity is broadcast as
//! [`AnalyzerEvent`]s.
//!
//! # Example
//!
//! ```rust,no_run
//! use la_client::{AnalyzerConfig, LogicAnalyzer};
//!
//! # async fn run() -> Result<(), la_client::ClientError> {
//! let mut analyzer = LogicAnalyzer::from_config(&AnalyzerConfig::new("/dev/ttyUSB0"));
//! let info = analyzer.connect().await?;
//! println!("Connected to {info}");
//!
//! let handles = analyzer.submit(["MON", "LINES"]).await?;
//! for handle in handles {
//!     let command = handle.command().to_owned();
//!     println!("{} -> {:?}", command, handle.wait().await);
//! }
//! analyzer.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod config;
pub mod error;
pub mod events;
pub mod handle;
mod link;
mod pending;
pub mod state;
pub mod transport;

pub use analyzer::LogicAnalyzer;
pub use config::{AnalyzerConfig, DEFAULT_BAUD_RATE, DEFAULT_COMMAND_TIMEOUT};
pub use error::{ClientError, CommandError};
pub use events::AnalyzerEvent;
pub use handle::{wait_all, CommandHandle, CommandResult};
pub use state::{ConnectionState, DeviceInfo};
pub use transport::{Connector, SerialConnector, StreamConnector};

// Re-export protocol types used in the public API
pub use la_protocol::{AnalyzerModel, Identification};
