//! WebSocket protocol message types.
//!
//! This module defines the JSON message format exchanged over the single
//! persistent connection.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `subscribeRequest` | Client → Server | Watch a resource path |
//! | `subscribeResponse` | Server → Client | Acknowledge with a subscription ID |
//! | `unsubscribeRequest` | Client → Server | Stop watching |
//! | `subscriptionNotification` | Server → Client | Resource may have changed |
//!
//! # Correlation
//!
//! Every request carries a `requestID`; every direct response echoes it.
//! Notifications carry only a `subscriptionID`.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `message` | Typed client and server messages |
//! | `request` | Outbound frames and inbound envelopes |

// ============================================================================
// Submodules
// ============================================================================

/// Typed client and server messages.
pub mod message;

/// Outbound request frames and inbound envelopes.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use message::{
    ClientRequest, MessageKind, QueryParam, ServerMessage, SubscriptionTarget,
};
pub use request::{Envelope, Inbound, Request};
