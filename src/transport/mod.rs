//! WebSocket transport layer.
//!
//! This module owns the single persistent socket shared by every request
//! and subscription.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐                         ┌─────────────────┐
//! │  RequestCorrelator   │──┐                      │                 │
//! │  SubscriptionManager │──┤ ConnectionListener   │  Subscription   │
//! │                      │  ▼                      │  Server         │
//! │            Connection (supervisor task) ◄─────►│                 │
//! └──────────────────────┘        WebSocket        └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Connection::new` - Create handle, status `Connecting`
//! 2. `Connection::listen` - Register lifecycle listeners
//! 3. `Connection::start` - Spawn supervisor, connect
//! 4. On drop of the socket - `on_close`, backoff, reconnect with a new epoch
//! 5. `Connection::shutdown` - Close for good
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `backoff` | Reconnection delay policy |
//! | `connection` | Socket supervisor and event loop |
//! | `listener` | Lifecycle listener registry |
//! | `sink` | Outbound seam used by the correlator |

// ============================================================================
// Submodules
// ============================================================================

/// Reconnection delay policy.
pub mod backoff;

/// WebSocket connection and event loop.
pub mod connection;

/// Lifecycle listener registry.
pub mod listener;

/// Outbound seam used by the protocol layers.
pub mod sink;

#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Re-exports
// ============================================================================

pub use backoff::ReconnectConfig;
pub use connection::{Connection, ConnectionConfig, ConnectionStatus};
pub use listener::{ConnectionListener, ListenerGuard, ListenerRegistry};
pub use sink::FrameSink;
