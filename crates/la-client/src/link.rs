//! Async I/O tasks for an open connection
//!
//! Each connection runs two spawned tasks:
//!
//! - The link actor owns the read half, the frame decoder and the pending
//!   queue. It reads continuously, correlates every block with the queue,
//!   serves submissions from the [`LogicAnalyzer`](crate::LogicAnalyzer) and
//!   evicts commands whose deadline passes.
//! - The transmit task owns the write half and writes whatever command the
//!   actor places in a single-slot watch channel. Writing a new slot value
//!   replaces an unsent one.
//!
//! A transport failure seen by either task fails every pending command and
//! ends both tasks.

use std::io::ErrorKind;
use std::time::Duration;

use la_protocol::{encode_command, FrameDecoder};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{ClientError, CommandError};
use crate::events::AnalyzerEvent;
use crate::handle::CommandHandle;
use crate::pending::PendingQueue;

/// Read buffer size
const READ_BUFFER: usize = 1024;

/// Commands that can be sent to a connection task
#[derive(Debug)]
pub(crate) enum TaskCommand {
    /// Shutdown the task
    Shutdown,
}

/// Requests served by the link actor
#[derive(Debug)]
pub(crate) enum LinkRequest {
    /// Queue a batch of commands
    Submit {
        commands: Vec<String>,
        timeout: Duration,
        response: oneshot::Sender<Result<Vec<CommandHandle>, ClientError>>,
    },
    /// Ask whether commands are pending
    IsBusy { response: oneshot::Sender<bool> },
    /// Reply once nothing is pending
    AwaitReady { response: oneshot::Sender<()> },
    /// The transmit task could not write
    TransportFailed { reason: String },
}

/// Slot holding the next command frame to transmit
pub(crate) type OutgoingSlot = watch::Sender<Option<Vec<u8>>>;

struct LinkActor {
    queue: PendingQueue,
    decoder: FrameDecoder,
    outgoing: OutgoingSlot,
    events: broadcast::Sender<AnalyzerEvent>,
    ready_waiters: Vec<oneshot::Sender<()>>,
}

impl LinkActor {
    fn handle_request(&mut self, request: LinkRequest) -> Result<(), String> {
        match request {
            LinkRequest::Submit {
                commands,
                timeout,
                response,
            } => {
                let result = self.queue.enqueue(commands, timeout, Instant::now());
                if result.is_ok() {
                    self.deliver_head();
                }
                let _ = response.send(result);
            }
            LinkRequest::IsBusy { response } => {
                let _ = response.send(self.queue.is_busy(Instant::now()));
            }
            LinkRequest::AwaitReady { response } => {
                self.ready_waiters.push(response);
                self.wake_if_idle();
            }
            LinkRequest::TransportFailed { reason } => return Err(reason),
        }
        Ok(())
    }

    fn handle_data(&mut self, data: &[u8]) {
        let _ = self.events.send(AnalyzerEvent::DataIn(data.to_vec()));
        self.decoder.push_bytes(data);

        while let Some(block) = self.decoder.next_block() {
            let outcome = self.queue.accept_block(block.into_tokens());
            if !outcome.excess.is_empty() {
                warn!("Discarding data received with no pending command: {:?}", outcome.excess);
                let _ = self.events.send(AnalyzerEvent::ExcessData(outcome.excess));
            }
            if outcome.resolved > 0 {
                self.deliver_head();
            }
        }
        self.wake_if_idle();
    }

    fn handle_deadline(&mut self) {
        if self.queue.expire(Instant::now()) {
            self.deliver_head();
        }
        self.wake_if_idle();
    }

    /// Hand the head command to the transmit task
    fn deliver_head(&self) {
        if let Some(command) = self.queue.head() {
            debug!("Delivering command {:?}", command);
            self.outgoing.send_replace(Some(encode_command(command)));
        }
    }

    fn wake_if_idle(&mut self) {
        if self.ready_waiters.is_empty() || self.queue.is_busy(Instant::now()) {
            return;
        }
        for waiter in self.ready_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }

    fn fail_transport(&mut self, reason: String) {
        warn!("Transport failed with {} commands pending: {}", self.queue.len(), reason);
        self.queue.fail_all(CommandError::Transport(reason.clone()));
        let _ = self.events.send(AnalyzerEvent::TransportFailed(reason));
    }
}

/// Run the link actor until shutdown or transport failure
pub(crate) async fn run_link_actor<R>(
    mut reader: R,
    mut requests: mpsc::Receiver<LinkRequest>,
    mut cmd_rx: mpsc::Receiver<TaskCommand>,
    outgoing: OutgoingSlot,
    events: broadcast::Sender<AnalyzerEvent>,
) where
    R: AsyncRead + Unpin,
{
    let mut actor = LinkActor {
        queue: PendingQueue::new(),
        decoder: FrameDecoder::new(),
        outgoing,
        events,
        ready_waiters: Vec::new(),
    };
    let mut buffer = [0u8; READ_BUFFER];

    info!("Starting link actor");

    loop {
        let deadline = actor.queue.next_deadline();

        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(TaskCommand::Shutdown) | None => {
                        info!("Shutdown requested for link actor");
                        break;
                    }
                }
            }

            request = requests.recv() => {
                match request {
                    Some(request) => {
                        if let Err(reason) = actor.handle_request(request) {
                            actor.fail_transport(reason);
                            break;
                        }
                    }
                    None => {
                        debug!("Link request channel closed");
                        break;
                    }
                }
            }

            result = reader.read(&mut buffer) => {
                match result {
                    Ok(0) => {
                        actor.fail_transport("connection closed by device".to_string());
                        break;
                    }
                    Ok(n) => {
                        let data = &buffer[..n];
                        debug!("Read {} bytes: {:?}", n, String::from_utf8_lossy(data));
                        actor.handle_data(data);
                    }
                    // Serial read timeouts just mean no data available
                    Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                    Err(e) => {
                        actor.fail_transport(format!("read error: {}", e));
                        break;
                    }
                }
            }

            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                actor.handle_deadline();
            }
        }
    }

    // Anything still pending resolves as cancelled when the queue drops
    if !actor.queue.is_empty() {
        debug!("Link actor ending with {} commands pending", actor.queue.len());
    }
    info!("Link actor ended");
}

/// Run the transmit task until shutdown, write failure or actor exit
pub(crate) async fn run_tx_task<W>(
    mut writer: W,
    mut outgoing: watch::Receiver<Option<Vec<u8>>>,
    mut cmd_rx: mpsc::Receiver<TaskCommand>,
    link: mpsc::Sender<LinkRequest>,
    events: broadcast::Sender<AnalyzerEvent>,
) where
    W: AsyncWrite + Unpin,
{
    info!("Starting transmit task");

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(TaskCommand::Shutdown) | None => {
                        info!("Shutdown requested for transmit task");
                        break;
                    }
                }
            }

            changed = outgoing.changed() => {
                if changed.is_err() {
                    debug!("Link actor gone, stopping transmit task");
                    break;
                }
                let frame = outgoing.borrow_and_update().clone();
                let Some(frame) = frame else {
                    continue;
                };

                debug!("Writing {:?}", String::from_utf8_lossy(&frame));
                if let Err(e) = write_frame(&mut writer, &frame).await {
                    warn!("Write error: {}", e);
                    let _ = link
                        .send(LinkRequest::TransportFailed {
                            reason: format!("write error: {}", e),
                        })
                        .await;
                    break;
                }
                let _ = events.send(AnalyzerEvent::DataOut(frame));
            }
        }
    }

    let _ = writer.shutdown().await;
    info!("Transmit task ended");
}

async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await
}
