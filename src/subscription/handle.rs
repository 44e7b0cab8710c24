//! Consumer-facing subscription handle and its callback slot.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};
use tokio::sync::watch;

use crate::error::{Error, Result};
use crate::identifiers::SubscriptionId;
use crate::protocol::SubscriptionTarget;

use super::manager::{SubscriptionKey, SubscriptionManager};
use super::status::SubscriptionStatus;

// ============================================================================
// Types
// ============================================================================

/// Invalidate callback.
pub(crate) type InvalidateFn = Box<dyn Fn() + Send + Sync>;

// ============================================================================
// Slot
// ============================================================================

/// Shared state of one subscription: target, status and callback gate.
///
/// `close` takes the gate after clearing `live`, so it returns only once no
/// other thread is inside the callback. A callback that closes its own
/// subscription re-enters the gate on the same thread.
pub(crate) struct Slot {
    target: SubscriptionTarget,
    on_invalidate: InvalidateFn,
    gate: ReentrantMutex<()>,
    live: AtomicBool,
    status: watch::Sender<SubscriptionStatus>,
    failure: Mutex<Option<String>>,
}

impl Slot {
    pub(crate) fn new(target: SubscriptionTarget, on_invalidate: InvalidateFn) -> Arc<Self> {
        let (status, _) = watch::channel(SubscriptionStatus::Disconnected);
        Arc::new(Self {
            target,
            on_invalidate,
            gate: ReentrantMutex::new(()),
            live: AtomicBool::new(true),
            status,
            failure: Mutex::new(None),
        })
    }

    #[inline]
    pub(crate) fn target(&self) -> &SubscriptionTarget {
        &self.target
    }

    #[inline]
    pub(crate) fn status(&self) -> SubscriptionStatus {
        *self.status.borrow()
    }

    /// Returns `true` if the status changed.
    pub(crate) fn set_status(&self, next: SubscriptionStatus) -> bool {
        self.status.send_if_modified(|status| {
            if *status == next {
                false
            } else {
                *status = next;
                true
            }
        })
    }

    pub(crate) fn fail(&self, reason: String) {
        *self.failure.lock() = Some(reason);
        self.set_status(SubscriptionStatus::Failed);
    }

    pub(crate) fn failure(&self) -> Option<String> {
        self.failure.lock().clone()
    }

    /// Runs the invalidate callback unless the slot is closed.
    pub(crate) fn notify(&self) {
        let _gate = self.gate.lock();
        if self.live.load(Ordering::Acquire) {
            (self.on_invalidate)();
        }
    }

    /// Detaches the callback. No invocation starts or is running after return.
    pub(crate) fn close(&self) {
        self.live.store(false, Ordering::Release);
        drop(self.gate.lock());
    }

    #[cfg(test)]
    pub(crate) fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    fn subscribe_status(&self) -> watch::Receiver<SubscriptionStatus> {
        self.status.subscribe()
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// A live watch on one server-side resource path.
///
/// Dropping the handle tears the subscription down: the callback is detached
/// immediately and the server is told to unsubscribe.
///
/// # Example
///
/// ```ignore
/// let subscription = client.subscribe(["motd"], || println!("refetch"));
/// subscription
///     .wait_for_status(|status| status.is_active())
///     .await;
/// ```
pub struct Subscription {
    key: SubscriptionKey,
    slot: Arc<Slot>,
    manager: Weak<SubscriptionManager>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("target", &self.slot.target().to_string())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl Subscription {
    pub(crate) fn new(
        key: SubscriptionKey,
        slot: Arc<Slot>,
        manager: Weak<SubscriptionManager>,
    ) -> Self {
        Self { key, slot, manager }
    }

    /// Returns the watched target.
    #[inline]
    #[must_use]
    pub fn target(&self) -> &SubscriptionTarget {
        self.slot.target()
    }

    /// Returns the current status.
    #[inline]
    #[must_use]
    pub fn status(&self) -> SubscriptionStatus {
        self.slot.status()
    }

    /// Returns a receiver that observes status changes.
    #[must_use]
    pub fn status_receiver(&self) -> watch::Receiver<SubscriptionStatus> {
        self.slot.subscribe_status()
    }

    /// Waits until `predicate` holds for the status and returns it.
    pub async fn wait_for_status(
        &self,
        mut predicate: impl FnMut(SubscriptionStatus) -> bool,
    ) -> SubscriptionStatus {
        let mut status_rx = self.slot.subscribe_status();
        match status_rx.wait_for(|status| predicate(*status)).await {
            Ok(status) => *status,
            Err(_) => self.status(),
        }
    }

    /// Surfaces a terminal failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SubscriptionFailed`] if the server rejected the
    /// subscription.
    pub fn check(&self) -> Result<()> {
        if self.status() != SubscriptionStatus::Failed {
            return Ok(());
        }

        let reason = self
            .slot
            .failure()
            .unwrap_or_else(|| "subscription rejected".to_string());
        Err(Error::subscription_failed(self.target().to_string(), reason))
    }

    /// Returns the server-assigned ID while active.
    #[must_use]
    pub fn subscription_id(&self) -> Option<SubscriptionId> {
        self.manager
            .upgrade()
            .and_then(|manager| manager.subscription_id(self.key))
    }

    /// Tears the subscription down now.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        match self.manager.upgrade() {
            Some(manager) => manager.teardown(self.key),
            None => self.slot.close(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
