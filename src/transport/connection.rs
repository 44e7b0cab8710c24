//! Reconnecting WebSocket connection and event loop.
//!
//! This module owns the single physical socket and its lifecycle.
//!
//! # Event Loop
//!
//! The connection spawns a supervisor task that:
//!
//! - Connects (bounded by `connect_timeout`)
//! - Assigns each socket a fresh [`ConnectionEpoch`] and emits `on_open`
//! - Forwards inbound text frames to listeners in arrival order
//! - Writes outbound frames tagged with the current epoch, discarding stale ones
//! - On closure emits `on_close` to every listener, then backs off and retries
//!
//! # Lifecycle
//!
//! ```text
//!            connect ok               socket drops
//! Connecting ─────────────► Open ──────────────────► Connecting (after backoff)
//!     │                      │
//!     │ retries exhausted    │ shutdown
//!     ▼                      ▼
//!   Closed ◄─────────────────┘
//! ```
//!
//! Only the supervisor changes the status.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::pin::pin;
use std::result::Result as StdResult;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::ConnectionEpoch;

use super::backoff::ReconnectConfig;
use super::listener::{ConnectionListener, ListenerGuard, ListenerRegistry};
use super::sink::FrameSink;

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for establishing a socket.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Types
// ============================================================================

/// Client socket type.
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lifecycle state of the logical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// No socket yet, or waiting to reconnect.
    Connecting,
    /// A socket is open.
    Open,
    /// Shut down or gave up reconnecting. Terminal.
    Closed,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        })
    }
}

/// Connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    /// Backoff policy for reconnection.
    pub reconnect: ReconnectConfig,
    /// Upper bound on a single connect attempt.
    pub connect_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the supervisor.
enum ConnectionCommand {
    /// Write a frame to the socket of `epoch`.
    Send { epoch: ConnectionEpoch, text: String },
    /// Drop the current socket and open a new one immediately.
    Reconnect,
    /// Close for good.
    Shutdown,
}

/// Why a socket's event loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SocketOutcome {
    /// Remote close, read error or write error.
    Dropped,
    /// Explicit reconnect.
    Reconnect,
    /// Explicit shutdown or every handle dropped.
    Shutdown,
}

// ============================================================================
// Shared
// ============================================================================

/// State shared between handles and the supervisor.
struct Shared {
    /// Current status.
    status: watch::Sender<ConnectionStatus>,
    /// Epoch of the open socket.
    epoch: Mutex<Option<ConnectionEpoch>>,
    /// Lifecycle listeners.
    listeners: Arc<ListenerRegistry>,
}

impl Shared {
    fn mark_open(&self, epoch: ConnectionEpoch) {
        *self.epoch.lock() = Some(epoch);
        self.status.send_replace(ConnectionStatus::Open);
    }

    fn mark_down(&self, status: ConnectionStatus) {
        *self.epoch.lock() = None;
        self.status.send_replace(status);
    }
}

// ============================================================================
// Connection
// ============================================================================

/// One logical, self-healing WebSocket connection.
///
/// Cheap to clone; all clones drive the same socket. The supervisor task
/// exits after [`shutdown`](Self::shutdown) or when every clone is dropped.
///
/// # Example
///
/// ```ignore
/// let connection = Connection::new("ws://localhost:8000/subscribe", ConnectionConfig::default());
/// let _guard = connection.listen(my_listener);
/// connection.start();
/// let epoch = connection.wait_open(Duration::from_secs(5)).await?;
/// ```
#[derive(Clone)]
pub struct Connection {
    /// Target URL.
    url: Arc<str>,
    /// Channel for sending commands to the supervisor.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Receiver handed to the supervisor on start.
    command_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<ConnectionCommand>>>>,
    /// Settings.
    config: Arc<ConnectionConfig>,
    /// Shared with the supervisor.
    shared: Arc<Shared>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("url", &self.url)
            .field("status", &self.status())
            .field("epoch", &self.epoch())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Creates a connection without starting it.
    ///
    /// Register listeners with [`listen`](Self::listen), then call
    /// [`start`](Self::start) so no lifecycle event is missed.
    #[must_use]
    pub fn new(url: impl Into<String>, config: ConnectionConfig) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(ConnectionStatus::Connecting);

        Self {
            url: Arc::from(url.into()),
            command_tx,
            command_rx: Arc::new(Mutex::new(Some(command_rx))),
            config: Arc::new(config),
            shared: Arc::new(Shared {
                status,
                epoch: Mutex::new(None),
                listeners: ListenerRegistry::new(),
            }),
        }
    }

    /// Creates and starts a connection.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn open(url: impl Into<String>, config: ConnectionConfig) -> Self {
        let connection = Self::new(url, config);
        connection.start();
        connection
    }

    /// Spawns the supervisor task. Subsequent calls do nothing.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let Some(command_rx) = self.command_rx.lock().take() else {
            return;
        };

        tokio::spawn(Self::run_supervisor(
            self.url.to_string(),
            ConnectionConfig::clone(&self.config),
            command_rx,
            Arc::clone(&self.shared),
        ));
    }

    /// Returns the target URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the current status.
    #[inline]
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.shared.status.borrow()
    }

    /// Returns a receiver that observes status changes.
    #[inline]
    #[must_use]
    pub fn status_receiver(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    /// Returns the epoch of the open socket, if any.
    #[inline]
    #[must_use]
    pub fn epoch(&self) -> Option<ConnectionEpoch> {
        *self.shared.epoch.lock()
    }

    /// Registers a lifecycle listener.
    #[must_use = "the listener is unregistered when the guard drops"]
    pub fn listen(&self, listener: Arc<dyn ConnectionListener>) -> ListenerGuard {
        self.shared.listeners.register(listener)
    }

    /// Queues a text frame for the socket identified by `epoch`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if that socket is not the open one.
    pub fn send_text(&self, epoch: ConnectionEpoch, text: String) -> Result<()> {
        if self.epoch() != Some(epoch) {
            return Err(Error::ConnectionClosed);
        }

        self.command_tx
            .send(ConnectionCommand::Send { epoch, text })
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Waits until a socket is open and returns its epoch.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection is closed for good
    /// - [`Error::ConnectionTimeout`] if nothing opens within `wait`
    pub async fn wait_open(&self, wait: Duration) -> Result<ConnectionEpoch> {
        let mut status_rx = self.shared.status.subscribe();

        let status = match timeout(
            wait,
            status_rx.wait_for(|status| *status != ConnectionStatus::Connecting),
        )
        .await
        {
            Ok(Ok(status)) => *status,
            Ok(Err(_)) => return Err(Error::ConnectionClosed),
            Err(_) => return Err(Error::connection_timeout(wait)),
        };

        match status {
            ConnectionStatus::Open => self.epoch().ok_or(Error::ConnectionClosed),
            _ => Err(Error::ConnectionClosed),
        }
    }

    /// Drops the current socket and opens a new one without backoff.
    ///
    /// Everything tied to the old socket is invalidated through `on_close`.
    pub fn reconnect(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Reconnect);
    }

    /// Closes the connection for good.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }

    /// Supervisor: connect, run, back off, repeat.
    async fn run_supervisor(
        url: String,
        config: ConnectionConfig,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        shared: Arc<Shared>,
    ) {
        let mut attempt: u32 = 0;

        loop {
            shared.mark_down(ConnectionStatus::Connecting);
            debug!(url = %url, attempt, "Connecting");

            let outcome = match Self::establish(&url, config.connect_timeout, &mut command_rx).await
            {
                Err(outcome) => outcome,
                Ok(Err(e)) => {
                    warn!(error = %e, attempt, "Connect attempt failed");
                    SocketOutcome::Dropped
                }
                Ok(Ok(ws_stream)) => {
                    attempt = 0;
                    let epoch = ConnectionEpoch::next();
                    shared.mark_open(epoch);
                    info!(url = %url, %epoch, "Connection open");
                    shared.listeners.emit_open(epoch);

                    let outcome = Self::run_event_loop(
                        ws_stream,
                        epoch,
                        &mut command_rx,
                        &shared.listeners,
                    )
                    .await;

                    let next_status = match outcome {
                        SocketOutcome::Shutdown => ConnectionStatus::Closed,
                        _ => ConnectionStatus::Connecting,
                    };
                    shared.mark_down(next_status);
                    info!(%epoch, ?outcome, "Connection closed");
                    shared.listeners.emit_close(epoch);
                    outcome
                }
            };

            match outcome {
                SocketOutcome::Shutdown => break,
                SocketOutcome::Reconnect => continue,
                SocketOutcome::Dropped => {}
            }

            if config.reconnect.exhausted(attempt) {
                error!(
                    attempts = attempt,
                    "Reconnection limit reached, giving up"
                );
                break;
            }

            let delay = config.reconnect.delay_for(attempt);
            attempt += 1;
            info!(?delay, attempt, "Waiting before reconnect");

            if Self::backoff(delay, &mut command_rx).await == SocketOutcome::Shutdown {
                break;
            }
        }

        shared.mark_down(ConnectionStatus::Closed);
        debug!("Connection supervisor terminated");
    }

    /// Connects while still honouring shutdown requests.
    ///
    /// `Err(outcome)` means the attempt was abandoned by a command.
    async fn establish(
        url: &str,
        connect_timeout: Duration,
        command_rx: &mut mpsc::UnboundedReceiver<ConnectionCommand>,
    ) -> StdResult<Result<WsStream>, SocketOutcome> {
        let mut connect = pin!(timeout(connect_timeout, connect_async(url)));

        loop {
            tokio::select! {
                biased;

                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Shutdown) | None => {
                            return Err(SocketOutcome::Shutdown);
                        }
                        Some(ConnectionCommand::Reconnect) => {
                            trace!("Reconnect requested while connecting");
                        }
                        Some(ConnectionCommand::Send { epoch, .. }) => {
                            trace!(%epoch, "Discarding frame for closed socket");
                        }
                    }
                }

                result = &mut connect => {
                    return Ok(match result {
                        Ok(Ok((ws_stream, _response))) => Ok(ws_stream),
                        Ok(Err(e)) => Err(Error::WebSocket(e)),
                        Err(_) => Err(Error::connection_timeout(connect_timeout)),
                    });
                }
            }
        }
    }

    /// Sleeps for `delay`, draining commands.
    ///
    /// Returns `Reconnect` to retry early, `Shutdown` to stop, `Dropped`
    /// when the delay simply elapsed.
    async fn backoff(
        delay: Duration,
        command_rx: &mut mpsc::UnboundedReceiver<ConnectionCommand>,
    ) -> SocketOutcome {
        let mut delay = pin!(sleep(delay));

        loop {
            tokio::select! {
                biased;

                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Shutdown) | None => return SocketOutcome::Shutdown,
                        Some(ConnectionCommand::Reconnect) => return SocketOutcome::Reconnect,
                        Some(ConnectionCommand::Send { epoch, .. }) => {
                            trace!(%epoch, "Discarding frame for closed socket");
                        }
                    }
                }

                () = &mut delay => return SocketOutcome::Dropped,
            }
        }
    }

    /// Event loop for one socket.
    async fn run_event_loop(
        ws_stream: WsStream,
        epoch: ConnectionEpoch,
        command_rx: &mut mpsc::UnboundedReceiver<ConnectionCommand>,
        listeners: &ListenerRegistry,
    ) -> SocketOutcome {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                // Incoming frames from the server
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            trace!(%epoch, len = text.len(), "Frame received");
                            listeners.emit_message(epoch, &text);
                        }

                        Some(Ok(Message::Close(frame))) => {
                            debug!(%epoch, ?frame, "WebSocket closed by remote");
                            return SocketOutcome::Dropped;
                        }

                        Some(Err(e)) => {
                            warn!(%epoch, error = %e, "WebSocket error");
                            return SocketOutcome::Dropped;
                        }

                        None => {
                            debug!(%epoch, "WebSocket stream ended");
                            return SocketOutcome::Dropped;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Commands from handles
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { epoch: frame_epoch, text }) => {
                            if frame_epoch != epoch {
                                trace!(%frame_epoch, %epoch, "Discarding frame for stale socket");
                            } else if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                                warn!(%epoch, error = %e, "Failed to write frame");
                                return SocketOutcome::Dropped;
                            }
                        }

                        Some(ConnectionCommand::Reconnect) => {
                            debug!(%epoch, "Reconnect requested");
                            let _ = ws_write.close().await;
                            return SocketOutcome::Reconnect;
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!(%epoch, "Shutdown command received");
                            let _ = ws_write.close().await;
                            return SocketOutcome::Shutdown;
                        }

                        None => {
                            debug!(%epoch, "Command channel closed");
                            let _ = ws_write.close().await;
                            return SocketOutcome::Shutdown;
                        }
                    }
                }
            }
        }
    }
}

// ============================================================================
// FrameSink
// ============================================================================

#[async_trait]
impl FrameSink for Connection {
    fn current_epoch(&self) -> Option<ConnectionEpoch> {
        self.epoch()
    }

    fn send_text(&self, epoch: ConnectionEpoch, text: String) -> Result<()> {
        Connection::send_text(self, epoch, text)
    }

    async fn wait_open(&self, wait: Duration) -> Result<ConnectionEpoch> {
        Connection::wait_open(self, wait).await
    }
}

// ============================================================================
// Tests
// ============================================================================
