//! Subscription health.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// SubscriptionStatus
// ============================================================================

/// Health of one subscription.
///
/// ```text
///               ack                     socket closed
///   Pending ──────────► Active ─────────────────────► Disconnected
///      ▲  │                                               │
///      │  │ rejected / malformed ack                      │ socket opened
///      │  ▼                                               │
///      │ Failed (terminal)                                │
///      └──────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionStatus {
    /// Subscribe request sent, no acknowledgment yet.
    Pending,
    /// Acknowledged; notifications are routed.
    Active,
    /// No open socket. Resubscribes automatically on reconnect.
    Disconnected,
    /// The server rejected the subscription or broke the contract.
    Failed,
}

impl SubscriptionStatus {
    /// Returns `true` when data fetched now is trustworthy.
    #[inline]
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns `true` for a state that is never left.
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Lowercase name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
