//! Virtual logic analyzer
//!
//! Provides a simulated analyzer that answers driver commands with
//! protocol-accurate replies. Built-in commands cover identification,
//! line sampling and monitor mode; any command can be overridden with a
//! scripted reply to reproduce device errors, silence or malformed output.

use std::collections::{HashMap, VecDeque};

use la_protocol::response::{error_token, ACK_TOKEN};
use la_protocol::{AnalyzerModel, IDENT_COMMAND, TERMINATOR};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Error code returned for commands the analyzer does not know
pub const ERROR_UNKNOWN_COMMAND: u8 = 1;

/// Reply the analyzer gives to a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    /// Data tokens followed by `OK` in the same block
    Data(Vec<String>),
    /// `ERROR NN`
    Error(u8),
    /// Bytes written verbatim, terminators included
    Raw(String),
    /// No reply at all
    Silence,
}

/// Configuration for creating a virtual analyzer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualAnalyzerConfig {
    /// Display name/identifier
    pub id: String,
    /// Model reported by `IDENT`
    pub model: AnalyzerModel,
    /// Firmware version reported by `IDENT`
    pub version: String,
    /// Number of input channels reported by `LINES`
    pub channels: usize,
}

impl Default for VirtualAnalyzerConfig {
    fn default() -> Self {
        Self {
            id: "Virtual Analyzer".to_string(),
            model: AnalyzerModel::La4800,
            version: "2.13".to_string(),
            channels: 8,
        }
    }
}

/// A simulated analyzer that generates protocol-accurate output
#[derive(Debug)]
pub struct VirtualAnalyzer {
    id: String,
    model: AnalyzerModel,
    version: String,
    /// Current input line levels
    lines: Vec<bool>,
    monitoring: bool,
    scripted: HashMap<String, Reply>,
    /// Pending output bytes, one entry per block
    pending_output: VecDeque<Vec<u8>>,
    /// Commands received (for test verification)
    received_commands: Vec<String>,
}

impl VirtualAnalyzer {
    /// Create a new virtual analyzer with default settings
    pub fn new(id: impl Into<String>) -> Self {
        Self::from_config(VirtualAnalyzerConfig {
            id: id.into(),
            ..Default::default()
        })
    }

    /// Create a virtual analyzer from configuration
    pub fn from_config(config: VirtualAnalyzerConfig) -> Self {
        Self {
            id: config.id,
            model: config.model,
            version: config.version,
            lines: vec![false; config.channels],
            monitoring: false,
            scripted: HashMap::new(),
            pending_output: VecDeque::new(),
            received_commands: Vec::new(),
        }
    }

    /// Get the analyzer's identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the reported model
    pub fn model(&self) -> AnalyzerModel {
        self.model
    }

    /// Get the reported firmware version
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Current line levels
    pub fn lines(&self) -> &[bool] {
        &self.lines
    }

    /// Drive an input line; out-of-range channels are ignored
    pub fn set_line(&mut self, channel: usize, level: bool) {
        if let Some(line) = self.lines.get_mut(channel) {
            *line = level;
        }
    }

    /// True once `MON` has been received
    pub fn monitoring(&self) -> bool {
        self.monitoring
    }

    /// Override the reply to a command
    pub fn script(&mut self, command: impl Into<String>, reply: Reply) {
        self.scripted.insert(command.into(), reply);
    }

    /// Remove a scripted reply, restoring the built-in behaviour
    pub fn unscript(&mut self, command: &str) {
        self.scripted.remove(command);
    }

    /// Commands received so far, in order
    pub fn received_commands(&self) -> &[String] {
        &self.received_commands
    }

    /// Handle one command and queue its reply
    pub fn process_command(&mut self, command: &str) {
        debug!("Virtual analyzer {} received {:?}", self.id, command);
        self.received_commands.push(command.to_string());

        if let Some(reply) = self.scripted.get(command).cloned() {
            self.queue_reply(reply);
            return;
        }

        match command {
            IDENT_COMMAND => {
                let ident = format!("{} V{}", self.model.name(), self.version);
                self.queue_block(&[ident]);
                self.queue_block(&[ACK_TOKEN.to_string()]);
            }
            "LINES" => {
                let levels: Vec<String> = self
                    .lines
                    .iter()
                    .map(|&level| if level { "1" } else { "0" }.to_string())
                    .collect();
                self.queue_reply(Reply::Data(levels));
            }
            "MON" => {
                self.monitoring = true;
                self.queue_reply(Reply::Data(Vec::new()));
            }
            _ => self.queue_reply(Reply::Error(ERROR_UNKNOWN_COMMAND)),
        }
    }

    /// Queue a reply, encoding it to wire bytes
    pub fn queue_reply(&mut self, reply: Reply) {
        match reply {
            Reply::Data(mut tokens) => {
                tokens.push(ACK_TOKEN.to_string());
                self.queue_block(&tokens);
            }
            Reply::Error(code) => self.queue_block(&[error_token(code)]),
            Reply::Raw(raw) => self.pending_output.push_back(raw.into_bytes()),
            Reply::Silence => {}
        }
    }

    /// Take the next pending output bytes
    pub fn take_output(&mut self) -> Option<Vec<u8>> {
        self.pending_output.pop_front()
    }

    /// Check if there is pending output
    pub fn has_output(&self) -> bool {
        !self.pending_output.is_empty()
    }

    /// Clear all pending output
    pub fn clear_output(&mut self) {
        self.pending_output.clear();
    }

    fn queue_block(&mut self, tokens: &[String]) {
        let mut out = tokens.join(",").into_bytes();
        out.push(TERMINATOR);
        self.pending_output.push_back(out);
    }

    /// Get a summary of current state
    pub fn state_summary(&self) -> String {
        let levels: String = self
            .lines
            .iter()
            .map(|&level| if level { '1' } else { '0' })
            .collect();
        format!(
            "{} ({} V{}) - lines {}{}",
            self.id,
            self.model,
            self.version,
            levels,
            if self.monitoring { " [MON]" } else { "" }
        )
    }
}
