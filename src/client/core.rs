//! Client facade over one shared connection.
//!
//! The [`Client`] wires the layers together:
//!
//! ```text
//! Connection ──on_message──► RequestCorrelator ──completion──► caller
//!     │                                │
//!     └──on_open/on_close/on_message──► SubscriptionManager ──► invalidate
//! ```
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
//!
//! let motd = client.subscribe(["motd"], || println!("motd changed"));
//! motd.wait_for_status(|status| status.is_active()).await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::cache::{Fetcher, SubscribedQuery};
use crate::correlator::RequestCorrelator;
use crate::error::Result;
use crate::protocol::{ClientRequest, ServerMessage, SubscriptionTarget};
use crate::subscription::{Subscription, SubscriptionManager};
use crate::transport::{Connection, ConnectionStatus, ListenerGuard};

use super::builder::ClientBuilder;
use super::options::ClientOptions;

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the client.
pub(crate) struct ClientInner {
    /// The single socket.
    connection: Connection,

    /// Request/response matching.
    correlator: Arc<RequestCorrelator>,

    /// Subscription registry.
    subscriptions: Arc<SubscriptionManager>,

    /// Keeps the correlator and manager registered as connection listeners.
    _listeners: [ListenerGuard; 2],
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        debug!(url = %self.connection.url(), "Client dropped, shutting down");
        self.connection.shutdown();
    }
}

// ============================================================================
// Client
// ============================================================================

/// Subscription client.
///
/// Cheap to clone; all clones share one connection. The connection shuts
/// down when the last clone is dropped.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

// ============================================================================
// Client - Display
// ============================================================================

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.inner.connection.url())
            .field("status", &self.status())
            .field("pending_requests", &self.pending_requests())
            .field("subscriptions", &self.inner.subscriptions.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Client - Constructor
// ============================================================================

impl Client {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Wires the layers and starts connecting.
    ///
    /// Listeners register before the socket opens so the first `on_open`
    /// reaches both of them.
    pub(crate) fn new(url: String, options: ClientOptions) -> Self {
        let connection = Connection::new(url, options.connection_config());
        let correlator =
            RequestCorrelator::new(Arc::new(connection.clone()), options.correlator_config());
        let subscriptions = SubscriptionManager::new(Arc::clone(&correlator));

        let listeners = [
            connection.listen(correlator.clone()),
            connection.listen(subscriptions.clone()),
        ];
        connection.start();

        info!(url = %connection.url(), "Client started");

        Self {
            inner: Arc::new(ClientInner {
                connection,
                correlator,
                subscriptions,
                _listeners: listeners,
            }),
        }
    }
}

// ============================================================================
// Client - Public API
// ============================================================================

impl Client {
    /// Returns the connection status.
    #[inline]
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.inner.connection.status()
    }

    /// Returns a receiver that observes connection status changes.
    #[inline]
    #[must_use]
    pub fn status_receiver(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.connection.status_receiver()
    }

    /// Returns the underlying connection.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.inner.connection
    }

    /// Returns the number of requests awaiting a response.
    #[inline]
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.inner.correlator.pending_count()
    }

    /// Returns the number of live subscriptions.
    #[inline]
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.len()
    }

    /// Sends a request and waits for its correlated response.
    ///
    /// # Errors
    ///
    /// See [`RequestCorrelator::request`].
    pub async fn request(&self, message: ClientRequest) -> Result<ServerMessage> {
        self.inner.correlator.request(message).await
    }

    /// Watches `target`, calling `on_invalidate` whenever its cached value
    /// must be refetched.
    ///
    /// `on_invalidate` runs on the transport task and must not block.
    pub fn subscribe<F>(&self, target: impl Into<SubscriptionTarget>, on_invalidate: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.subscriptions.subscribe(target, on_invalidate)
    }

    /// Creates a cached query for `target`, refetched through `fetcher`
    /// while its subscription is active.
    pub fn query<F>(
        &self,
        target: impl Into<SubscriptionTarget>,
        fetcher: F,
    ) -> SubscribedQuery<F::Output>
    where
        F: Fetcher,
    {
        SubscribedQuery::spawn(&self.inner.subscriptions, target, fetcher)
    }

    /// Drops the current socket and connects again.
    #[inline]
    pub fn reconnect(&self) {
        self.inner.connection.reconnect();
    }

    /// Closes the connection for good.
    ///
    /// Pending requests fail with `ConnectionClosed`; subscriptions become
    /// `Disconnected`.
    #[inline]
    pub fn shutdown(&self) {
        info!(url = %self.inner.connection.url(), "Client shutdown requested");
        self.inner.connection.shutdown();
    }
}

// ============================================================================
// Tests
// ============================================================================
