//! Virtual analyzer actor task
//!
//! This module provides a pure async task that owns a VirtualAnalyzer and
//! serves it over an async stream. The task uses a select! loop to:
//! - Read `\r`-terminated commands from the stream and answer them
//! - Inject unsolicited bytes on request (for excess-data scenarios)
//! - Handle shutdown, which drops the stream so the peer sees end-of-file

use std::io;

use la_protocol::FrameDecoder;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::VirtualAnalyzer;

/// Size of the in-memory pipe created by [`spawn_virtual_analyzer`]
const DUPLEX_BUFFER: usize = 4096;

/// Commands that can be sent to a virtual analyzer actor
#[derive(Debug, Clone)]
pub enum VirtualAnalyzerCommand {
    /// Write raw bytes to the peer as if the device had sent them
    Inject(Vec<u8>),
    /// Stop serving and close the stream
    Shutdown,
}

/// Run the virtual analyzer actor task
///
/// Returns the analyzer when the stream closes or shutdown is requested so
/// callers can inspect what it received.
pub async fn run_virtual_analyzer_task<S>(
    mut stream: S,
    mut analyzer: VirtualAnalyzer,
    mut cmd_rx: mpsc::Receiver<VirtualAnalyzerCommand>,
) -> io::Result<VirtualAnalyzer>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 1024];
    let mut commands_open = true;

    info!(
        "Starting virtual analyzer task for {} ({} V{})",
        analyzer.id(),
        analyzer.model(),
        analyzer.version()
    );

    loop {
        tokio::select! {
            result = stream.read(&mut buf) => {
                match result {
                    Ok(0) => {
                        debug!("Virtual analyzer stream closed for {}", analyzer.id());
                        break;
                    }
                    Ok(n) => {
                        decoder.push_bytes(&buf[..n]);
                        while let Some(block) = decoder.next_block() {
                            if block.is_empty() {
                                continue;
                            }
                            analyzer.process_command(&block.to_string());
                        }
                        while let Some(out) = analyzer.take_output() {
                            stream.write_all(&out).await?;
                        }
                        stream.flush().await?;
                    }
                    Err(e) => {
                        warn!("Virtual analyzer {} stream error: {}", analyzer.id(), e);
                        return Err(e);
                    }
                }
            }

            cmd = cmd_rx.recv(), if commands_open => {
                match cmd {
                    Some(VirtualAnalyzerCommand::Inject(data)) => {
                        debug!("Virtual analyzer {} injecting {:?}", analyzer.id(), String::from_utf8_lossy(&data));
                        stream.write_all(&data).await?;
                        stream.flush().await?;
                    }
                    Some(VirtualAnalyzerCommand::Shutdown) => {
                        info!("Shutdown requested for virtual analyzer {}", analyzer.id());
                        break;
                    }
                    None => commands_open = false,
                }
            }
        }
    }

    info!("Virtual analyzer task ended for {}", analyzer.id());
    Ok(analyzer)
}

/// A virtual analyzer running in its own task
pub struct VirtualAnalyzerLink {
    /// Driver side of the in-memory transport
    pub stream: DuplexStream,
    /// Control channel for the analyzer task
    pub commands: mpsc::Sender<VirtualAnalyzerCommand>,
    /// Task handle, yields the analyzer once the task ends
    pub task: JoinHandle<io::Result<VirtualAnalyzer>>,
}

/// Spawn a virtual analyzer behind an in-memory duplex stream
///
/// Must be called from within a tokio runtime.
pub fn spawn_virtual_analyzer(analyzer: VirtualAnalyzer) -> VirtualAnalyzerLink {
    let (stream, analyzer_stream) = tokio::io::duplex(DUPLEX_BUFFER);
    let (commands, cmd_rx) = mpsc::channel(32);
    let task = tokio::spawn(run_virtual_analyzer_task(analyzer_stream, analyzer, cmd_rx));
    VirtualAnalyzerLink {
        stream,
        commands,
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Reply;
    use std::time::Duration;

    async fn read_exactly(stream: &mut DuplexStream, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        tokio::time::timeout(Duration::from_millis(500), stream.read_exact(&mut buf))
            .await
            .unwrap()
            .unwrap();
        buf
    }

    #[tokio::test]
    async fn test_virtual_analyzer_answers_ident() {
        let mut link = spawn_virtual_analyzer(VirtualAnalyzer::new("Test"));

        link.stream.write_all(b"IDENT\r").await.unwrap();
        let reply = read_exactly(&mut link.stream, b"LA4800 V2.13\rOK\r".len()).await;
        assert_eq!(reply, b"LA4800 V2.13\rOK\r");

        link.commands.send(VirtualAnalyzerCommand::Shutdown).await.unwrap();
        let analyzer = link.task.await.unwrap().unwrap();
        assert_eq!(analyzer.received_commands(), ["IDENT"]);
    }

    #[tokio::test]
    async fn test_virtual_analyzer_handles_split_commands() {
        let mut analyzer = VirtualAnalyzer::new("Test");
        analyzer.script("PING", Reply::Data(vec!["PONG".into()]));
        let mut link = spawn_virtual_analyzer(analyzer);

        link.stream.write_all(b"PI").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        link.stream.write_all(b"NG\r").await.unwrap();

        assert_eq!(read_exactly(&mut link.stream, 8).await, b"PONG,OK\r");
    }

    #[tokio::test]
    async fn test_virtual_analyzer_inject() {
        let mut link = spawn_virtual_analyzer(VirtualAnalyzer::new("Test"));

        link.commands
            .send(VirtualAnalyzerCommand::Inject(b"NOISE\r".to_vec()))
            .await
            .unwrap();
        assert_eq!(read_exactly(&mut link.stream, 6).await, b"NOISE\r");
    }

    #[tokio::test]
    async fn test_virtual_analyzer_shutdown_closes_stream() {
        let mut link = spawn_virtual_analyzer(VirtualAnalyzer::new("Test"));

        link.commands.send(VirtualAnalyzerCommand::Shutdown).await.unwrap();

        let mut buf = [0u8; 8];
        let n = tokio::time::timeout(Duration::from_millis(500), link.stream.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_virtual_analyzer_ends_when_peer_drops() {
        let link = spawn_virtual_analyzer(VirtualAnalyzer::new("Test"));
        drop(link.stream);

        let result = tokio::time::timeout(Duration::from_millis(500), link.task)
            .await
            .unwrap();
        assert!(result.unwrap().is_ok());
    }
}
