//! Bolts client - subscription-driven cache invalidation over WebSocket.
//!
//! This library keeps client-side cached resources fresh by listening for
//! change signals from a subscription server.
//!
//! # Architecture
//!
//! The client follows a signal-then-pull model:
//!
//! - **Subscription server**: pushes `subscriptionNotification` frames when a
//!   watched path may have changed
//! - **Client (Rust)**: turns those signals into refetches of the resource
//!   through an ordinary request path (typically HTTP)
//!
//! Key design principles:
//!
//! - One persistent socket per [`Client`], shared by every subscription
//! - Frames are JSON objects tagged by `messageType`
//! - Requests are correlated by `requestID`, notifications routed by `subscriptionID`
//! - Reconnect with backoff; every subscription is re-established and
//!   invalidated on reconnect
//!
//! # Quick Start
//!
//! ```no_run
//! use bolts_client::{Client, Error, FnFetcher, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::builder()
//!         .url("ws://localhost:8000/subscribe")
//!         .build()?;
//!
//!     // Refetched whenever the server signals a change to /motd.
//!     let mut motd = client.query(
//!         ["motd"],
//!         FnFetcher::new(|| async { Ok::<_, Error>(String::from("fetched over HTTP")) }),
//!     );
//!
//!     let state = motd.wait_for(|state| state.data.is_some()).await;
//!     println!("motd: {:?}", state.data);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`Client`] facade and configuration |
//! | [`cache`] | Subscription-gated queries |
//! | [`subscription`] | Subscription lifecycle and multiplexing |
//! | [`correlator`] | Request/response matching |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | WebSocket message types |
//! | [`transport`] | WebSocket transport layer |

// ============================================================================
// Modules
// ============================================================================

/// Subscription-gated query cache.
///
/// - [`SubscribedQuery`] - cached value refetched on invalidation
/// - [`Fetcher`] - how the value is read
pub mod cache;

/// Client factory and configuration.
///
/// Use [`Client::builder()`] to create a configured client instance.
pub mod client;

/// Request/response correlation over the shared socket.
pub mod correlator;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing request and subscription IDs.
pub mod identifiers;

/// WebSocket protocol message types.
pub mod protocol;

/// Subscription lifecycle.
pub mod subscription;

/// WebSocket transport layer.
///
/// Connection supervision, reconnection and lifecycle events.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Cache types
pub use cache::{FnFetcher, Fetcher, QueryState, SubscribedQuery};

// Client types
pub use client::{Client, ClientBuilder, ClientOptions};

// Correlation types
pub use correlator::{CorrelatorConfig, MAX_PENDING_REQUESTS, RequestCorrelator};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ConnectionEpoch, RequestId, SubscriptionId};

// Protocol types
pub use protocol::{ClientRequest, MessageKind, QueryParam, ServerMessage, SubscriptionTarget};

// Subscription types
pub use subscription::{Subscription, SubscriptionManager, SubscriptionStatus};

// Transport types
pub use transport::{
    Connection, ConnectionConfig, ConnectionListener, ConnectionStatus, FrameSink,
    ListenerGuard, ReconnectConfig,
};
