//! Subscriptions to server-side resource paths.
//!
//! A subscription tells the client when to refetch a resource. It never
//! carries the resource itself.
//!
//! # Invalidation Policy
//!
//! The invalidate callback fires:
//!
//! - once per routed `subscriptionNotification`
//! - once each time the subscription becomes [`SubscriptionStatus::Active`],
//!   including after every reconnect, since changes may have been missed
//!   while the subscription was not active
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `handle` | [`Subscription`] handle |
//! | `manager` | [`SubscriptionManager`] multiplexer |
//! | `status` | [`SubscriptionStatus`] state machine |

// ============================================================================
// Submodules
// ============================================================================

/// Consumer-facing handle.
pub mod handle;

/// Multiplexer over one connection.
pub mod manager;

/// Subscription health.
pub mod status;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use handle::Subscription;
pub use manager::SubscriptionManager;
pub use status::SubscriptionStatus;
