//! LA4800 Simulation Library
//!
//! This crate provides a simulated logic analyzer for exercising the driver
//! without physical hardware. It includes:
//!
//! - **VirtualAnalyzer**: answers commands with protocol-accurate replies
//! - **run_virtual_analyzer_task**: serves a `VirtualAnalyzer` over any async stream
//!
//! # Example
//!
//! ```rust
//! use la_sim::VirtualAnalyzer;
//!
//! let mut analyzer = VirtualAnalyzer::new("bench");
//! analyzer.process_command("IDENT");
//!
//! // Identification arrives as a data block followed by an acknowledgment
//! assert_eq!(analyzer.take_output().unwrap(), b"LA4800 V2.13\r");
//! assert_eq!(analyzer.take_output().unwrap(), b"OK\r");
//! ```

pub mod analyzer;
pub mod analyzer_task;

pub use analyzer::{Reply, VirtualAnalyzer, VirtualAnalyzerConfig, ERROR_UNKNOWN_COMMAND};
pub use analyzer_task::{
    run_virtual_analyzer_task, spawn_virtual_analyzer, VirtualAnalyzerCommand, VirtualAnalyzerLink,
};
