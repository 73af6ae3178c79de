//! LA4800 Protocol Library
//!
//! This crate provides framing, classification and encoding for the serial
//! protocol spoken by the LA4800 and LA3200 logic analyzers.
//!
//! # Format
//!
//! - Commands: ASCII text terminated by `\r` (`LINES\r`)
//! - Responses: comma-separated tokens, each block terminated by `\r`
//! - Acknowledgment: the literal token `OK`
//! - Error: `ERROR NN` where `NN` is a two-digit code
//!
//! A command's response is every data token received since the previous
//! terminal token, closed by exactly one `OK` or `ERROR NN`. Data and the
//! terminal token may arrive in the same block (`A,B,OK\r`) or in separate
//! blocks (`A,B\rOK\r`).
//!
//! # Example
//!
//! ```rust
//! use la_protocol::{BlockKind, FrameDecoder};
//!
//! let mut decoder = FrameDecoder::new();
//! decoder.push_bytes(b"DATA1,DATA2,OK\r");
//!
//! let block = decoder.next_block().unwrap();
//! assert_eq!(block.tokens(), ["DATA1", "DATA2", "OK"]);
//! assert_eq!(block.kind(), BlockKind::Acknowledgment);
//! ```

pub mod error;
pub mod frame;
pub mod ident;
pub mod response;

pub use error::ParseError;
pub use frame::{encode_command, Block, FrameDecoder};
pub use ident::{parse_identification, AnalyzerModel, Identification, IDENT_COMMAND};
pub use response::{classify_token, BlockKind, TokenKind};

/// Separates tokens within a response block
pub const DELIMITER: u8 = b',';

/// Terminates commands and response blocks
pub const TERMINATOR: u8 = b'\r';
