//! Pending command queue and response correlation
//!
//! Commands are answered strictly in order. Each received block is walked
//! token by token against the head of the queue:
//!
//! - `OK` resolves the head with the data tokens collected so far
//! - `ERROR NN` resolves the head as failed, the error token included in its data
//! - anything else is a data token for the head
//!
//! Tokens arriving while nothing is pending are excess and are reported to the
//! caller. Data tokens left over at the end of a block stay buffered for the
//! head, so a reply may span several blocks.

use std::collections::VecDeque;
use std::mem;
use std::time::Duration;

use la_protocol::{classify_token, TokenKind};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{ClientError, CommandError};
use crate::handle::{CommandHandle, CommandResult};

/// A submitted command waiting for its `OK`/`ERROR`
#[derive(Debug)]
struct PendingCommand {
    command: String,
    deadline: Instant,
    timeout: Duration,
    reply: oneshot::Sender<CommandResult>,
}

impl PendingCommand {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    fn resolve(self, result: CommandResult) {
        // The caller may have dropped its handle
        let _ = self.reply.send(result);
    }
}

/// What a received block did to the queue
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct BlockOutcome {
    /// Number of commands resolved by the block
    pub resolved: usize,
    /// Tokens that arrived with nothing pending
    pub excess: Vec<String>,
}

/// FIFO of unresolved commands plus the data collected for the head
#[derive(Debug, Default)]
pub(crate) struct PendingQueue {
    entries: VecDeque<PendingCommand>,
    received: Vec<String>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Command at the head of the queue, the one on the wire
    pub fn head(&self) -> Option<&str> {
        self.entries.front().map(|entry| entry.command.as_str())
    }

    /// Data tokens collected for the head so far
    #[cfg(test)]
    pub fn received(&self) -> &[String] {
        &self.received
    }

    /// True while any unexpired command is pending
    ///
    /// A queue whose entries have all passed their deadline is cleared here.
    pub fn is_busy(&mut self, now: Instant) -> bool {
        if !self.entries.is_empty() && self.entries.iter().all(|entry| entry.is_expired(now)) {
            debug!("All {} pending commands expired", self.entries.len());
            self.expire(now);
        }
        !self.entries.is_empty()
    }

    /// Append a batch of commands, all sharing one deadline
    ///
    /// Nothing is queued unless the whole batch is accepted. On success the
    /// queue was idle before, so the caller must transmit the new head.
    pub fn enqueue(
        &mut self,
        commands: Vec<String>,
        timeout: Duration,
        now: Instant,
    ) -> Result<Vec<CommandHandle>, ClientError> {
        if commands.is_empty() {
            return Err(ClientError::NoCommands);
        }
        if self.is_busy(now) {
            return Err(ClientError::Busy);
        }

        let deadline = now + timeout;
        let handles = commands
            .into_iter()
            .map(|command| {
                let (reply, rx) = oneshot::channel();
                let handle = CommandHandle::new(command.clone(), deadline, timeout, rx);
                self.entries.push_back(PendingCommand {
                    command,
                    deadline,
                    timeout,
                    reply,
                });
                handle
            })
            .collect();
        Ok(handles)
    }

    /// Earliest deadline among pending commands
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.iter().map(|entry| entry.deadline).min()
    }

    /// Fail every command whose deadline has passed
    ///
    /// Returns true if the head was evicted, in which case its partial data is
    /// discarded and the caller must transmit the new head.
    pub fn expire(&mut self, now: Instant) -> bool {
        let head_expired = self
            .entries
            .front()
            .is_some_and(|entry| entry.is_expired(now));
        if !self.entries.iter().any(|entry| entry.is_expired(now)) {
            return false;
        }
        if head_expired {
            self.received.clear();
        }

        let (expired, live): (VecDeque<_>, VecDeque<_>) = mem::take(&mut self.entries)
            .into_iter()
            .partition(|entry| entry.is_expired(now));
        self.entries = live;
        for entry in expired {
            warn!("Command {:?} timed out after {:?}", entry.command, entry.timeout);
            let timeout = entry.timeout;
            entry.resolve(Err(CommandError::Timeout(timeout)));
        }
        head_expired
    }

    /// Correlate one received block with the queue
    pub fn accept_block(&mut self, tokens: Vec<String>) -> BlockOutcome {
        let mut outcome = BlockOutcome::default();
        if tokens.is_empty() {
            return outcome;
        }

        let mut data = mem::take(&mut self.received);
        let mut tokens = tokens.into_iter();
        while let Some(token) = tokens.next() {
            if self.entries.is_empty() {
                outcome.excess.append(&mut data);
                outcome.excess.push(token);
                outcome.excess.extend(tokens.by_ref());
                break;
            }

            match classify_token(&token) {
                TokenKind::Acknowledge => {
                    self.resolve_head(Ok(mem::take(&mut data)));
                    outcome.resolved += 1;
                }
                TokenKind::Error(code) => {
                    data.push(token);
                    let data = mem::take(&mut data);
                    self.resolve_head(Err(CommandError::Device { code, data }));
                    outcome.resolved += 1;
                }
                TokenKind::Data => data.push(token),
            }
        }

        if self.entries.is_empty() {
            outcome.excess.append(&mut data);
        } else {
            self.received = data;
        }
        outcome
    }

    /// Fail every pending command with the same error
    pub fn fail_all(&mut self, error: CommandError) {
        self.received.clear();
        for entry in self.entries.drain(..) {
            entry.resolve(Err(error.clone()));
        }
    }

    fn resolve_head(&mut self, result: CommandResult) {
        let Some(head) = self.entries.pop_front() else {
            return;
        };
        match &result {
            Ok(data) => debug!("Command {:?} completed with {} tokens", head.command, data.len()),
            Err(CommandError::Device { code, .. }) => {
                warn!("Command {:?} failed with error {:02}", head.command, code)
            }
            Err(e) => debug!("Command {:?} failed: {}", head.command, e),
        }
        head.resolve(result);
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Reply for one command: data tokens and whether it ends in an error
    fn reply_strategy() -> impl Strategy<Value = (Vec<String>, Option<u8>)> {
        (
            prop::collection::vec("[A-Z0-9]{1,6}".prop_filter("data token", |t| t != "OK"), 0..4),
            prop::option::of(0u8..100),
        )
    }

    proptest! {
        /// Results arrive in submission order whatever the block boundaries
        #[test]
        fn results_follow_submission_order(
            replies in prop::collection::vec(reply_strategy(), 1..8),
            cuts in prop::collection::vec(any::<bool>(), 0..64),
        ) {
            let commands: Vec<String> = (0..replies.len()).map(|i| format!("CMD{i}")).collect();
            let mut queue = PendingQueue::new();
            let mut handles = queue
                .enqueue(commands, Duration::from_secs(60), Instant::now())
                .unwrap();

            let mut stream = Vec::new();
            for (data, error) in &replies {
                stream.extend(data.iter().cloned());
                stream.push(match error {
                    Some(code) => format!("ERROR {code:02}"),
                    None => "OK".to_string(),
                });
            }

            let mut block = Vec::new();
            let mut cuts = cuts.into_iter();
            for token in stream {
                block.push(token);
                if cuts.next().unwrap_or(false) {
                    prop_assert!(queue.accept_block(mem::take(&mut block)).excess.is_empty());
                }
            }
            prop_assert!(queue.accept_block(block).excess.is_empty());
            prop_assert!(queue.is_empty());

            for (handle, (data, error)) in handles.iter_mut().zip(&replies) {
                let expected = match error {
                    Some(code) => {
                        let mut data = data.clone();
                        data.push(format!("ERROR {code:02}"));
                        Err(CommandError::Device { code: *code, data })
                    }
                    None => Ok(data.clone()),
                };
                prop_assert_eq!(handle.try_result(), Some(expected));
            }
        }

        /// A busy queue never grows
        #[test]
        fn busy_queue_rejects_submissions(pending in 1usize..5, extra in 1usize..5) {
            let now = Instant::now();
            let mut queue = PendingQueue::new();
            let _handles = queue
                .enqueue((0..pending).map(|i| i.to_string()).collect(), Duration::from_secs(60), now)
                .unwrap();

            let result = queue.enqueue((0..extra).map(|i| i.to_string()).collect(), Duration::from_secs(60), now);
            prop_assert!(matches!(result, Err(ClientError::Busy)));
            prop_assert_eq!(queue.len(), pending);
        }
    }
}
