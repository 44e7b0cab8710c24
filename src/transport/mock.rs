//! Test doubles for the transport.
//!
//! - [`RecordingSink`] records outbound frames without any socket.
//! - [`MockServer`] binds `127.0.0.1:0`, accepts connections one after
//!   another and exposes every inbound text frame as parsed JSON. Tests script
//!   the server side by pushing frames and dropping the current socket.

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::ConnectionEpoch;

use super::sink::FrameSink;

// ============================================================================
// Constants
// ============================================================================

/// Upper bound for anything a test waits on.
const WAIT: Duration = Duration::from_secs(5);

// ============================================================================
// Types
// ============================================================================

enum Control {
    Send(String),
    Drop,
}

// ============================================================================
// RecordingSink
// ============================================================================

/// Client-side frame sink that records instead of sending.
///
/// Tests open and close epochs by hand and feed responses straight into
/// listeners.
#[derive(Default)]
pub(crate) struct RecordingSink {
    epoch: Mutex<Option<ConnectionEpoch>>,
    sent: Mutex<Vec<Value>>,
}

impl RecordingSink {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn open(&self, epoch: ConnectionEpoch) {
        *self.epoch.lock() = Some(epoch);
    }

    pub(crate) fn close(&self) {
        *self.epoch.lock() = None;
    }

    /// Drains everything sent so far.
    pub(crate) fn take_sent(&self) -> Vec<Value> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub(crate) fn sent_len(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl FrameSink for RecordingSink {
    fn current_epoch(&self) -> Option<ConnectionEpoch> {
        *self.epoch.lock()
    }

    fn send_text(&self, epoch: ConnectionEpoch, text: String) -> Result<()> {
        if self.current_epoch() != Some(epoch) {
            return Err(Error::ConnectionClosed);
        }
        let value = serde_json::from_str(&text)?;
        self.sent.lock().push(value);
        Ok(())
    }

    async fn wait_open(&self, wait: Duration) -> Result<ConnectionEpoch> {
        self.current_epoch()
            .ok_or_else(|| Error::connection_timeout(wait))
    }
}

// ============================================================================
// MockServer
// ============================================================================

/// Scripted server side of the subscription protocol.
pub(crate) struct MockServer {
    port: u16,
    inbound_rx: mpsc::UnboundedReceiver<Value>,
    control_tx: mpsc::UnboundedSender<Control>,
    accepted: Arc<AtomicUsize>,
}

impl MockServer {
    /// Binds a random port and starts accepting.
    pub(crate) async fn start() -> Self {
        let listener = TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
            .await
            .expect("bind mock server");
        let port = listener.local_addr().expect("local addr").port();

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let accepted = Arc::new(AtomicUsize::new(0));

        tokio::spawn(Self::run(
            listener,
            inbound_tx,
            control_rx,
            Arc::clone(&accepted),
        ));

        Self {
            port,
            inbound_rx,
            control_tx,
            accepted,
        }
    }

    /// Returns `ws://127.0.0.1:{port}`.
    pub(crate) fn url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    /// Number of sockets accepted so far.
    pub(crate) fn connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Pushes a frame to the current socket.
    pub(crate) fn send(&self, value: Value) {
        let _ = self.control_tx.send(Control::Send(value.to_string()));
    }

    /// Pushes a raw text frame to the current socket.
    pub(crate) fn send_raw(&self, text: &str) {
        let _ = self.control_tx.send(Control::Send(text.to_string()));
    }

    /// Closes the current socket; the server keeps accepting.
    pub(crate) fn drop_connection(&self) {
        let _ = self.control_tx.send(Control::Drop);
    }

    /// Next frame received from any client socket.
    pub(crate) async fn next_frame(&mut self) -> Value {
        timeout(WAIT, self.inbound_rx.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("mock server stopped")
    }

    /// Asserts that nothing arrives for `wait`.
    pub(crate) async fn assert_no_frame(&mut self, wait: Duration) {
        if let Ok(Some(frame)) = timeout(wait, self.inbound_rx.recv()).await {
            panic!("unexpected client frame: {frame}");
        }
    }

    /// Polls `condition` until it holds.
    pub(crate) async fn eventually(&self, condition: impl Fn() -> bool) {
        let deadline = tokio::time::Instant::now() + WAIT;
        while !condition() {
            assert!(
                tokio::time::Instant::now() < deadline,
                "condition not reached in time"
            );
            sleep(Duration::from_millis(5)).await;
        }
    }

    async fn run(
        listener: TcpListener,
        inbound_tx: mpsc::UnboundedSender<Value>,
        mut control_rx: mpsc::UnboundedReceiver<Control>,
        accepted: Arc<AtomicUsize>,
    ) {
        loop {
            let Ok((stream, addr)) = listener.accept().await else {
                return;
            };
            let Ok(ws_stream) = accept_async(stream).await else {
                continue;
            };
            accepted.fetch_add(1, Ordering::SeqCst);
            debug!(?addr, "Mock server accepted socket");

            let (mut ws_write, mut ws_read) = ws_stream.split();

            loop {
                tokio::select! {
                    message = ws_read.next() => {
                        match message {
                            Some(Ok(Message::Text(text))) => {
                                let value = serde_json::from_str(&text).unwrap_or(Value::Null);
                                let _ = inbound_tx.send(value);
                            }
                            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                            _ => {}
                        }
                    }

                    control = control_rx.recv() => {
                        match control {
                            Some(Control::Send(text)) => {
                                if ws_write.send(Message::Text(text.into())).await.is_err() {
                                    break;
                                }
                            }
                            Some(Control::Drop) => {
                                let _ = ws_write.close().await;
                                break;
                            }
                            None => return,
                        }
                    }
                }
            }
        }
    }
}
