//! Connection lifecycle and command submission

use std::time::Duration;

use la_protocol::{parse_identification, AnalyzerModel, ParseError, IDENT_COMMAND};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{AnalyzerConfig, DEFAULT_COMMAND_TIMEOUT};
use crate::error::ClientError;
use crate::events::AnalyzerEvent;
use crate::handle::CommandHandle;
use crate::link::{run_link_actor, run_tx_task, LinkRequest, TaskCommand};
use crate::state::{ConnectionState, DeviceInfo};
use crate::transport::{Connector, SerialConnector};

/// Capacity of the event broadcast channel
const EVENT_CAPACITY: usize = 256;

/// Capacity of the link request channel
const REQUEST_CAPACITY: usize = 32;

/// Lower bound on how long disconnect waits for each task
const MIN_JOIN_TIMEOUT: Duration = Duration::from_millis(250);

/// State reported once the link tasks have died under an open session
static LINK_LOST: ConnectionState = ConnectionState::Disconnected;

/// Tasks and channels of an open connection
struct Session {
    requests: mpsc::Sender<LinkRequest>,
    link_cmd: mpsc::Sender<TaskCommand>,
    tx_cmd: mpsc::Sender<TaskCommand>,
    link_task: JoinHandle<()>,
    tx_task: JoinHandle<()>,
}

/// Driver for one LA4800/LA3200 analyzer
///
/// Commands are submitted in batches while the connection is idle and resolve
/// in order through their [`CommandHandle`]s.
pub struct LogicAnalyzer<C> {
    connector: C,
    timeout: Duration,
    state: ConnectionState,
    session: Option<Session>,
    events: broadcast::Sender<AnalyzerEvent>,
}

impl LogicAnalyzer<SerialConnector> {
    /// Create a serial-port driver from connection settings
    pub fn from_config(config: &AnalyzerConfig) -> Self {
        Self::with_timeout(SerialConnector::from_config(config), config.command_timeout())
    }
}

impl<C: Connector> LogicAnalyzer<C> {
    /// Create a driver with the default command timeout
    pub fn new(connector: C) -> Self {
        Self::with_timeout(connector, DEFAULT_COMMAND_TIMEOUT)
    }

    /// Create a driver with a custom command timeout
    pub fn with_timeout(connector: C, timeout: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            connector,
            timeout,
            state: ConnectionState::Disconnected,
            session: None,
            events,
        }
    }

    /// Subscribe to connection events
    pub fn subscribe(&self) -> broadcast::Receiver<AnalyzerEvent> {
        self.events.subscribe()
    }

    /// Current command timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Change the timeout for subsequently submitted commands
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Current lifecycle state
    ///
    /// Reports `Disconnected` as soon as a transport failure ends the link,
    /// even before [`disconnect`](Self::disconnect) cleans up the session.
    pub fn state(&self) -> &ConnectionState {
        if self.link_lost() {
            &LINK_LOST
        } else {
            &self.state
        }
    }

    /// Identity reported by the device, once connected
    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.state().device_info()
    }

    /// Model reported by the device, once connected
    pub fn model(&self) -> Option<AnalyzerModel> {
        self.device_info().map(|info| info.model)
    }

    /// Firmware version reported by the device, once connected
    pub fn version(&self) -> Option<&str> {
        self.device_info().map(|info| info.version.as_str())
    }

    /// True while the transport is open and its tasks are running
    pub fn is_connected(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| !session.requests.is_closed())
    }

    fn link_lost(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.requests.is_closed())
    }

    /// True while submitted commands are unresolved
    pub async fn is_busy(&self) -> bool {
        self.request(|response| LinkRequest::IsBusy { response })
            .await
            .unwrap_or(false)
    }

    /// Wait until no submitted command is pending
    ///
    /// Returns immediately when not connected.
    pub async fn await_ready(&self) {
        let _ = self
            .request(|response| LinkRequest::AwaitReady { response })
            .await;
    }

    /// Submit a batch of commands
    ///
    /// The batch is rejected as a whole when another batch is still pending.
    pub async fn submit<I, S>(&self, commands: I) -> Result<Vec<CommandHandle>, ClientError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let commands: Vec<String> = commands.into_iter().map(Into::into).collect();
        let timeout = self.timeout;
        self.request(|response| LinkRequest::Submit {
            commands,
            timeout,
            response,
        })
        .await
        .ok_or(ClientError::NotConnected)?
    }

    /// Submit a single command
    pub async fn submit_one(&self, command: impl Into<String>) -> Result<CommandHandle, ClientError> {
        let mut handles = self.submit([command.into()]).await?;
        handles.pop().ok_or(ClientError::NoCommands)
    }

    /// Submit a single command and wait for its data tokens
    pub async fn query(&self, command: impl Into<String>) -> Result<Vec<String>, ClientError> {
        let handle = self.submit_one(command).await?;
        Ok(handle.wait().await?)
    }

    /// Open the transport and identify the device
    pub async fn connect(&mut self) -> Result<DeviceInfo, ClientError> {
        if self.session.is_some() {
            if self.is_connected() {
                return Err(ClientError::AlreadyConnected);
            }
            // Tasks ended after a transport failure
            self.disconnect().await;
        }

        let port = self.connector.describe();
        info!("Connecting to analyzer on {}", port);
        self.state = ConnectionState::Connecting;

        let io = match self.connector.open() {
            Ok(io) => io,
            Err(source) => {
                warn!("Failed to open {}: {}", port, source);
                self.state = ConnectionState::Disconnected;
                return Err(ClientError::TransportOpen { port, source });
            }
        };

        let (reader, writer) = tokio::io::split(io);
        let (requests, requests_rx) = mpsc::channel(REQUEST_CAPACITY);
        let (link_cmd, link_cmd_rx) = mpsc::channel(1);
        let (tx_cmd, tx_cmd_rx) = mpsc::channel(1);
        let (outgoing, outgoing_rx) = watch::channel(None);

        let link_task = tokio::spawn(run_link_actor(
            reader,
            requests_rx,
            link_cmd_rx,
            outgoing,
            self.events.clone(),
        ));
        let tx_task = tokio::spawn(run_tx_task(
            writer,
            outgoing_rx,
            tx_cmd_rx,
            requests.clone(),
            self.events.clone(),
        ));
        self.session = Some(Session {
            requests,
            link_cmd,
            tx_cmd,
            link_task,
            tx_task,
        });

        self.state = ConnectionState::Identifying;
        match self.identify().await {
            Ok(info) => {
                info!("Connected to {} on {}", info, port);
                self.state = ConnectionState::Connected(info.clone());
                let _ = self.events.send(AnalyzerEvent::Connected(info.clone()));
                Ok(info)
            }
            Err(e) => {
                warn!("Could not identify device on {}: {}", port, e);
                self.disconnect().await;
                Err(e)
            }
        }
    }

    /// Close the connection
    ///
    /// Stops both I/O tasks, waiting at most one command timeout (never less
    /// than a short floor) for each. Pending commands resolve as cancelled.
    /// Does nothing when not connected.
    pub async fn disconnect(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        info!("Disconnecting from {}", self.connector.describe());

        // Either task may already have ended
        let _ = session.link_cmd.try_send(TaskCommand::Shutdown);
        let _ = session.tx_cmd.try_send(TaskCommand::Shutdown);
        drop(session.requests);

        let join_timeout = self.timeout.max(MIN_JOIN_TIMEOUT);
        join_task("link", session.link_task, join_timeout).await;
        join_task("transmit", session.tx_task, join_timeout).await;

        self.state = ConnectionState::Disconnected;
        let _ = self.events.send(AnalyzerEvent::Disconnected);
        info!("Disconnected");
    }

    async fn identify(&self) -> Result<DeviceInfo, ClientError> {
        let tokens = self
            .query(IDENT_COMMAND)
            .await
            .map_err(|e| ClientError::Identification(e.to_string()))?;
        parse_identification(&tokens).map_err(|e| match e {
            ParseError::UnexpectedTokenCount { actual: 0, .. } => {
                ClientError::Identification("no identification returned".to_string())
            }
            other => ClientError::Identification(other.to_string()),
        })
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> LinkRequest,
    ) -> Option<T> {
        let session = self.session.as_ref()?;
        let (response, rx) = oneshot::channel();
        session.requests.send(make(response)).await.ok()?;
        rx.await.ok()
    }
}

async fn join_task(name: &str, mut task: JoinHandle<()>, timeout: Duration) {
    match tokio::time::timeout(timeout, &mut task).await {
        Ok(Ok(())) => debug!("{} task stopped", name),
        Ok(Err(e)) => warn!("{} task failed: {}", name, e),
        Err(_) => {
            warn!("{} task did not stop within {:?}, aborting", name, timeout);
            task.abort();
        }
    }
}
