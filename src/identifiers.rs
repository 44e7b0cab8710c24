//! Type-safe identifiers.
//!
//! Newtype wrappers prevent mixing incompatible IDs at compile time.
//!
//! | Type | Origin | Wire form |
//! |------|--------|-----------|
//! | [`RequestId`] | Client, monotonic counter | `requestID` string |
//! | [`SubscriptionId`] | Server, opaque | `subscriptionID` string |
//! | [`ConnectionEpoch`] | Client, one per socket | never sent |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ============================================================================
// Counters
// ============================================================================

/// Process-wide request counter.
///
/// Shared by every client so IDs never repeat within a process, including
/// across reconnects.
static NEXT_REQUEST: AtomicU64 = AtomicU64::new(1);

/// Process-wide socket counter.
static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// RequestId
// ============================================================================

/// Correlation identifier attached to every client request.
///
/// Responses echo it back. Generated IDs come from a monotonic counter, so
/// two live requests can never share one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Generates the next unique request ID.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        let n = NEXT_REQUEST.fetch_add(1, Ordering::Relaxed);
        Self(format!("req-{n}"))
    }

    /// Returns the ID as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ============================================================================
// SubscriptionId
// ============================================================================

/// Server-assigned identifier of an acknowledged subscription.
///
/// Only meaningful for the socket it was issued on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    /// Returns the ID as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubscriptionId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for SubscriptionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ============================================================================
// ConnectionEpoch
// ============================================================================

/// Identifies one physical socket of a reconnecting connection.
///
/// Each successful (re)connect gets a strictly greater epoch. Anything tied
/// to an older epoch (pending requests, subscription IDs, queued frames) is
/// stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionEpoch(u64);

impl ConnectionEpoch {
    /// Allocates the next epoch.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_EPOCH.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates an epoch from a raw value.
    #[inline]
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
