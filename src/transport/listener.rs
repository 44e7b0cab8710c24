//! Connection lifecycle listeners.
//!
//! Components register once with [`ListenerRegistry::register`] and keep the
//! returned [`ListenerGuard`]; dropping the guard unregisters exactly once.
//! Events are delivered synchronously, in registration order, on the
//! connection task.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

use crate::identifiers::ConnectionEpoch;

// ============================================================================
// ConnectionListener
// ============================================================================

/// Receives connection lifecycle events.
///
/// Implementations must not block: they run inline on the connection task
/// and the next inbound frame is not read until they return.
pub trait ConnectionListener: Send + Sync {
    /// A new socket is open.
    fn on_open(&self, epoch: ConnectionEpoch) {
        let _ = epoch;
    }

    /// The socket for `epoch` closed. Delivered before any reconnect delay.
    fn on_close(&self, epoch: ConnectionEpoch) {
        let _ = epoch;
    }

    /// A text frame arrived on the socket for `epoch`.
    fn on_message(&self, epoch: ConnectionEpoch, raw: &str) {
        let _ = (epoch, raw);
    }
}

// ============================================================================
// ListenerRegistry
// ============================================================================

/// Ordered set of registered listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Arc<dyn ConnectionListener>)>>,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a listener. It stays registered until the guard drops.
    #[must_use = "the listener is unregistered when the guard drops"]
    pub fn register(self: &Arc<Self>, listener: Arc<dyn ConnectionListener>) -> ListenerGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, listener));
        trace!(listener = id, "Listener registered");

        ListenerGuard {
            id,
            registry: Arc::downgrade(self),
        }
    }

    /// Returns the number of registered listeners.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Returns `true` if nothing is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }

    pub(crate) fn emit_open(&self, epoch: ConnectionEpoch) {
        for listener in self.snapshot() {
            listener.on_open(epoch);
        }
    }

    pub(crate) fn emit_close(&self, epoch: ConnectionEpoch) {
        for listener in self.snapshot() {
            listener.on_close(epoch);
        }
    }

    pub(crate) fn emit_message(&self, epoch: ConnectionEpoch, raw: &str) {
        for listener in self.snapshot() {
            listener.on_message(epoch, raw);
        }
    }

    /// Listeners are invoked outside the lock so they may register others.
    fn snapshot(&self) -> Vec<Arc<dyn ConnectionListener>> {
        self.listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }

    fn unregister(&self, id: u64) {
        self.listeners.lock().retain(|(existing, _)| *existing != id);
        trace!(listener = id, "Listener unregistered");
    }
}

// ============================================================================
// ListenerGuard
// ============================================================================

/// Registration handle; unregisters on drop.
pub struct ListenerGuard {
    id: u64,
    registry: Weak<ListenerRegistry>,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.id);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
