//! Outbound seam between the transport and the protocol layers.
//!
//! The correlator only needs to know which socket is open and how to put a
//! frame on it. [`Connection`](super::Connection) is the production
//! implementation; tests substitute a recording sink.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::identifiers::ConnectionEpoch;

// ============================================================================
// FrameSink
// ============================================================================

/// Read/send-only view of a connection.
///
/// Nothing behind this trait can change the connection's lifecycle.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Epoch of the currently open socket, if any.
    fn current_epoch(&self) -> Option<ConnectionEpoch>;

    /// Queues a text frame for the socket identified by `epoch`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) if
    /// that socket is no longer open.
    fn send_text(&self, epoch: ConnectionEpoch, text: String) -> Result<()>;

    /// Waits until a socket is open.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) if the
    ///   connection is closed for good
    /// - [`Error::ConnectionTimeout`](crate::Error::ConnectionTimeout) if no
    ///   socket opens within `wait`
    async fn wait_open(&self, wait: Duration) -> Result<ConnectionEpoch>;
}
