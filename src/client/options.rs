//! Client configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use bolts_client::{ClientOptions, ReconnectConfig};
//!
//! let options = ClientOptions::new()
//!     .with_request_timeout(Duration::from_secs(5))
//!     .with_reconnect(ReconnectConfig::default().with_max_retries(10));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::correlator::{CorrelatorConfig, MAX_PENDING_REQUESTS};
use crate::transport::{ConnectionConfig, ReconnectConfig};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for opening a socket.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for a correlated response.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// ClientOptions
// ============================================================================

/// Timeouts, limits and reconnection policy.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientOptions {
    /// Upper bound on a single connect attempt, and on how long a request
    /// waits for an open socket. Default: 10s.
    pub connect_timeout: Duration,

    /// How long a request waits for its response. Default: 30s.
    pub request_timeout: Duration,

    /// In-flight request limit. Default: 100.
    pub max_pending_requests: usize,

    /// Reconnection backoff.
    pub reconnect: ReconnectConfig,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_pending_requests: MAX_PENDING_REQUESTS,
            reconnect: ReconnectConfig::default(),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ClientOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the request timeout.
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the in-flight request limit.
    #[inline]
    #[must_use]
    pub fn with_max_pending_requests(mut self, max: usize) -> Self {
        self.max_pending_requests = max;
        self
    }

    /// Sets the reconnection policy.
    #[inline]
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }
}

// ============================================================================
// Conversion
// ============================================================================

impl ClientOptions {
    pub(crate) fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            reconnect: self.reconnect.clone(),
            connect_timeout: self.connect_timeout,
        }
    }

    pub(crate) fn correlator_config(&self) -> CorrelatorConfig {
        CorrelatorConfig {
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
            max_pending: self.max_pending_requests,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
