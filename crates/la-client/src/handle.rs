//! Per-command result handles

use std::time::Duration;

use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio::time::Instant;

use crate::error::CommandError;

/// Result of a single command: its data tokens, or why it failed
pub type CommandResult = Result<Vec<String>, CommandError>;

/// Awaitable result of one submitted command
///
/// Handles resolve in submission order. A handle that is never awaited does
/// not hold up the rest of its batch.
#[derive(Debug)]
pub struct CommandHandle {
    command: String,
    deadline: Instant,
    timeout: Duration,
    reply: oneshot::Receiver<CommandResult>,
}

impl CommandHandle {
    pub(crate) fn new(
        command: String,
        deadline: Instant,
        timeout: Duration,
        reply: oneshot::Receiver<CommandResult>,
    ) -> Self {
        Self {
            command,
            deadline,
            timeout,
            reply,
        }
    }

    /// The command this handle belongs to
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Point in time after which the command counts as timed out
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Wait for the command to resolve, at most until its deadline
    pub async fn wait(self) -> CommandResult {
        match tokio::time::timeout_at(self.deadline, self.reply).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CommandError::Cancelled),
            Err(_) => Err(CommandError::Timeout(self.timeout)),
        }
    }

    /// Poll for the result without waiting
    ///
    /// Returns `None` while the command is still pending. The result is
    /// handed out once; later calls report [`CommandError::Cancelled`].
    pub fn try_result(&mut self) -> Option<CommandResult> {
        match self.reply.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) if Instant::now() >= self.deadline => {
                Some(Err(CommandError::Timeout(self.timeout)))
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(CommandError::Cancelled)),
        }
    }
}

/// Wait for every handle of a batch, preserving order
pub async fn wait_all(handles: Vec<CommandHandle>) -> Vec<CommandResult> {
    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.wait().await);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(timeout: Duration) -> (oneshot::Sender<CommandResult>, CommandHandle) {
        let (tx, rx) = oneshot::channel();
        let handle = CommandHandle::new("LINES".into(), Instant::now() + timeout, timeout, rx);
        (tx, handle)
    }

    #[tokio::test]
    async fn test_wait_returns_result() {
        let (tx, handle) = handle(Duration::from_secs(1));
        assert_eq!(handle.command(), "LINES");
        tx.send(Ok(vec!["1".into()])).unwrap();
        assert_eq!(handle.wait().await, Ok(vec!["1".to_string()]));
    }

    #[tokio::test]
    async fn test_wait_times_out_at_deadline() {
        let (_tx, handle) = handle(Duration::from_millis(20));
        assert_eq!(
            handle.wait().await,
            Err(CommandError::Timeout(Duration::from_millis(20)))
        );
    }

    #[tokio::test]
    async fn test_dropped_sender_cancels() {
        let (tx, handle) = handle(Duration::from_secs(1));
        drop(tx);
        assert_eq!(handle.wait().await, Err(CommandError::Cancelled));
    }

    #[test]
    fn test_try_result() {
        let (tx, mut handle) = handle(Duration::from_secs(60));
        assert!(handle.try_result().is_none());

        tx.send(Err(CommandError::Device {
            code: 7,
            data: vec!["ERROR 07".into()],
        }))
        .unwrap();
        assert!(matches!(
            handle.try_result(),
            Some(Err(CommandError::Device { code: 7, .. }))
        ));
    }

    #[tokio::test]
    async fn test_wait_all_preserves_order() {
        let (tx1, first) = handle(Duration::from_secs(1));
        let (tx2, second) = handle(Duration::from_secs(1));
        tx2.send(Ok(vec!["B".into()])).unwrap();
        tx1.send(Ok(vec!["A".into()])).unwrap();

        let results = wait_all(vec![first, second]).await;
        assert_eq!(results, vec![Ok(vec!["A".to_string()]), Ok(vec!["B".to_string()])]);
    }
}
