//! Builder pattern for client configuration.
//!
//! Provides a fluent API for configuring and creating [`Client`] instances.
//!
//! # Example
//!
//! ```no_run
//! use bolts_client::Client;
//!
//! # async fn example() -> bolts_client::Result<()> {
//! let client = Client::builder()
//!     .url("ws://localhost:8000/subscribe")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::transport::ReconnectConfig;

use super::core::Client;
use super::options::ClientOptions;

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for configuring a [`Client`] instance.
///
/// Use [`Client::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct ClientBuilder {
    /// WebSocket endpoint.
    url: Option<String>,
    /// Timeouts, limits and reconnection policy.
    options: ClientOptions,
}

// ============================================================================
// ClientBuilder Implementation
// ============================================================================

impl ClientBuilder {
    /// Creates a new builder with default options and no URL.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the WebSocket endpoint (`ws://` or `wss://`).
    #[inline]
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Replaces all options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the reconnection policy.
    #[inline]
    #[must_use]
    pub fn reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.options.reconnect = reconnect;
        self
    }

    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// Sets the request timeout.
    #[inline]
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.options.request_timeout = timeout;
        self
    }

    /// Sets the in-flight request limit.
    #[inline]
    #[must_use]
    pub fn max_pending_requests(mut self, max: usize) -> Self {
        self.options.max_pending_requests = max;
        self
    }

    /// Builds the client and starts connecting in the background.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the URL is missing or not `ws`/`wss`, an option
    ///   is out of range, or no Tokio runtime is running
    /// - [`Error::Url`] if the URL does not parse
    pub fn build(self) -> Result<Client> {
        let url = self.validate_url()?;
        self.validate_options()?;

        if tokio::runtime::Handle::try_current().is_err() {
            return Err(Error::config(
                "Client::build() must be called within a Tokio runtime",
            ));
        }

        Ok(Client::new(url, self.options))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientBuilder {
    /// Validates the endpoint URL.
    fn validate_url(&self) -> Result<String> {
        let raw = self.url.as_deref().ok_or_else(|| {
            Error::config(
                "Server URL is required. Use .url() to set it.\n\
                 Example: Client::builder().url(\"ws://localhost:8000/subscribe\")",
            )
        })?;

        let url = Url::parse(raw)?;
        match url.scheme() {
            "ws" | "wss" => Ok(url.into()),
            scheme => Err(Error::config(format!(
                "Unsupported URL scheme '{scheme}'. Expected ws:// or wss://"
            ))),
        }
    }

    /// Validates timeouts and limits.
    fn validate_options(&self) -> Result<()> {
        let options = &self.options;

        if options.connect_timeout.is_zero() {
            return Err(Error::config("connect_timeout must be greater than zero"));
        }
        if options.request_timeout.is_zero() {
            return Err(Error::config("request_timeout must be greater than zero"));
        }
        if options.max_pending_requests == 0 {
            return Err(Error::config("max_pending_requests must be at least 1"));
        }
        if options.reconnect.initial_delay.is_zero() {
            return Err(Error::config(
                "reconnect.initial_delay must be greater than zero",
            ));
        }
        if options.reconnect.initial_delay > options.reconnect.max_delay {
            return Err(Error::config(
                "reconnect.initial_delay must not exceed reconnect.max_delay",
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
