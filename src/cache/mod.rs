//! Pull-based cache gated on subscription health.
//!
//! The core never ships resource payloads, only invalidation signals. This
//! module turns those signals into fetches:
//!
//! - fetch only while the subscription is [`Active`](crate::SubscriptionStatus::Active)
//! - treat every invalidate as "refetch now"
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `fetcher` | [`Fetcher`] seam and closure adapter |
//! | `query` | [`SubscribedQuery`] and [`QueryState`] |

// ============================================================================
// Submodules
// ============================================================================

/// Resource fetch seam.
pub mod fetcher;

/// Subscribed query.
pub mod query;

// ============================================================================
// Re-exports
// ============================================================================

pub use fetcher::{FnFetcher, Fetcher};
pub use query::{QueryState, SubscribedQuery};
