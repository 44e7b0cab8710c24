//! Error types for the live-subscription client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use bolts_client::{ClientRequest, Result};
//!
//! async fn example(client: &bolts_client::Client) -> Result<()> {
//!     let response = client.request(ClientRequest::subscribe(["motd"])).await?;
//!     println!("{response:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`] |
//! | Protocol | [`Error::UnexpectedResponseKind`], [`Error::MalformedResponse`], [`Error::Protocol`] |
//! | Subscription | [`Error::SubscriptionFailed`] |
//! | Execution | [`Error::RequestTimeout`], [`Error::Fetch`] |
//! | External | [`Error::Json`], [`Error::WebSocket`], [`Error::Url`] |
//!
//! Transient faults ([`Error::ConnectionClosed`] and friends) are healed by the
//! connection and subscription layers. Protocol-shape violations are surfaced
//! once and never retried.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;
use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::RequestId;
use crate::protocol::MessageKind;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    ///
    /// Returned when a socket cannot be established or written to.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Timed out waiting for the connection to open.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Transport unavailable.
    ///
    /// Returned for requests issued while no socket is open and the
    /// connection will not recover, and for every request still pending
    /// when its socket closes. Callers must re-issue after reconnection.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// The server answered a request with the wrong message shape.
    ///
    /// Signals a client/server schema mismatch. Not retried.
    #[error("Request {request_id} expected {expected} but received {actual}")]
    UnexpectedResponseKind {
        /// The request that was answered.
        request_id: RequestId,
        /// The message kind the request expects.
        expected: MessageKind,
        /// The `messageType` the server sent.
        actual: String,
    },

    /// The server answered with the right kind but an invalid body.
    #[error("Malformed response to request {request_id}: {message}")]
    MalformedResponse {
        /// The request that was answered.
        request_id: RequestId,
        /// Schema validation failure.
        message: String,
    },

    /// Protocol violation or local protocol limit.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Subscription Errors
    // ========================================================================
    /// Subscription rejected by the server.
    ///
    /// Terminal: the subscription does not auto-recover.
    #[error("Subscription to {path} failed: {reason}")]
    SubscriptionFailed {
        /// Display form of the subscribed path.
        path: String,
        /// Why the acknowledgment was rejected.
        reason: String,
    },

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// Request timeout.
    ///
    /// Returned when no correlated response arrives in time.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Resource fetch failed.
    ///
    /// Produced by [`Fetcher`](crate::cache::Fetcher) implementations.
    #[error("Fetch failed: {message}")]
    Fetch {
        /// Description of the fetch failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// URL parse error.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout: Duration) -> Self {
        Self::ConnectionTimeout {
            timeout_ms: saturating_millis(timeout),
        }
    }

    /// Creates an unexpected response kind error.
    #[inline]
    pub fn unexpected_response_kind(
        request_id: RequestId,
        expected: MessageKind,
        actual: impl Into<String>,
    ) -> Self {
        Self::UnexpectedResponseKind {
            request_id,
            expected,
            actual: actual.into(),
        }
    }

    /// Creates a malformed response error.
    #[inline]
    pub fn malformed_response(request_id: RequestId, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            request_id,
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a subscription failed error.
    #[inline]
    pub fn subscription_failed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SubscriptionFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout: Duration) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms: saturating_millis(timeout),
        }
    }

    /// Creates a fetch error.
    #[inline]
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if the server broke the message contract.
    ///
    /// These indicate a programming error on one side and are never retried.
    #[inline]
    #[must_use]
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedResponseKind { .. }
                | Self::MalformedResponse { .. }
                | Self::SubscriptionFailed { .. }
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed when re-issued after reconnection.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed
                | Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::RequestTimeout { .. }
                | Self::Fetch { .. }
        )
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Tests
// ============================================================================
