//! Pull-based query kept fresh by a subscription.
//!
//! # Refetch Loop
//!
//! ```text
//! invalidate ──► dirty ──► wait for Active ──► fetch ──► publish state
//!                  ▲                                        │
//!                  └────────── invalidated meanwhile ◄──────┘
//! ```
//!
//! Invalidations that arrive during a fetch coalesce into one follow-up
//! fetch. Nothing is fetched while the subscription is not active.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::protocol::SubscriptionTarget;
use crate::subscription::{Subscription, SubscriptionManager, SubscriptionStatus};

use super::fetcher::Fetcher;

// ============================================================================
// QueryState
// ============================================================================

/// Snapshot of a query.
#[derive(Debug, Clone)]
pub struct QueryState<T> {
    /// Last successfully fetched (or written) value.
    pub data: Option<T>,
    /// Error from the most recent fetch, cleared by the next success.
    pub error: Option<Arc<Error>>,
    /// Completed fetches, successful or not.
    pub fetch_count: u64,
    /// A fetch is in flight.
    pub is_fetching: bool,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            fetch_count: 0,
            is_fetching: false,
        }
    }
}

// ============================================================================
// Shared
// ============================================================================

struct Shared<T> {
    state: watch::Sender<QueryState<T>>,
    dirty: AtomicBool,
    wake: Notify,
}

impl<T> Shared<T> {
    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    async fn wait_dirty(&self) {
        while !self.dirty.swap(false, Ordering::AcqRel) {
            self.wake.notified().await;
        }
    }
}

// ============================================================================
// SubscribedQuery
// ============================================================================

/// Cached value of one resource, refetched whenever its subscription says so.
///
/// Dropping the query stops the refetch task and tears down the subscription.
pub struct SubscribedQuery<T> {
    shared: Arc<Shared<T>>,
    state_rx: watch::Receiver<QueryState<T>>,
    subscription: Subscription,
    task: JoinHandle<()>,
}

impl<T: fmt::Debug> fmt::Debug for SubscribedQuery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscribedQuery")
            .field("subscription", &self.subscription)
            .field("state", &*self.state_rx.borrow())
            .finish()
    }
}

impl<T> SubscribedQuery<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Subscribes to `target` and starts the refetch task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F>(
        manager: &SubscriptionManager,
        target: impl Into<SubscriptionTarget>,
        fetcher: F,
    ) -> Self
    where
        F: Fetcher<Output = T>,
    {
        let (state, state_rx) = watch::channel(QueryState::default());
        let shared = Arc::new(Shared {
            state,
            dirty: AtomicBool::new(false),
            wake: Notify::new(),
        });

        let weak: Weak<Shared<T>> = Arc::downgrade(&shared);
        let subscription = manager.subscribe(target, move || {
            if let Some(shared) = weak.upgrade() {
                shared.mark_dirty();
            }
        });

        let task = tokio::spawn(Self::run_refetch_loop(
            Arc::clone(&shared),
            subscription.status_receiver(),
            fetcher,
        ));

        Self {
            shared,
            state_rx,
            subscription,
            task,
        }
    }

    /// Returns a snapshot of the state.
    #[must_use]
    pub fn state(&self) -> QueryState<T> {
        self.state_rx.borrow().clone()
    }

    /// Returns the cached value.
    #[must_use]
    pub fn data(&self) -> Option<T> {
        self.state_rx.borrow().data.clone()
    }

    /// Returns the health of the backing subscription.
    #[inline]
    #[must_use]
    pub fn subscription_status(&self) -> SubscriptionStatus {
        self.subscription.status()
    }

    /// Returns the backing subscription.
    #[inline]
    #[must_use]
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Waits for the next state change and returns the new state.
    pub async fn changed(&mut self) -> QueryState<T> {
        let _ = self.state_rx.changed().await;
        self.state_rx.borrow_and_update().clone()
    }

    /// Waits until `predicate` holds and returns that state.
    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&QueryState<T>) -> bool,
    ) -> QueryState<T> {
        let reached = match self.state_rx.wait_for(|state| predicate(state)).await {
            Ok(state) => Some(state.clone()),
            Err(_) => None,
        };
        reached.unwrap_or_else(|| self.state())
    }

    /// Writes a value directly, e.g. the result of a mutation.
    pub fn set_data(&self, value: T) {
        self.shared.state.send_modify(|state| {
            state.data = Some(value);
            state.error = None;
        });
    }

    /// Requests a refetch, performed once the subscription is active.
    pub fn invalidate(&self) {
        self.shared.mark_dirty();
    }

    async fn run_refetch_loop<F>(
        shared: Arc<Shared<T>>,
        mut status_rx: watch::Receiver<SubscriptionStatus>,
        fetcher: F,
    ) where
        F: Fetcher<Output = T>,
    {
        loop {
            shared.wait_dirty().await;

            if status_rx.wait_for(|status| status.is_active()).await.is_err() {
                return;
            }
            // Invalidations raised while waiting are covered by this fetch.
            shared.dirty.store(false, Ordering::Release);

            shared.state.send_modify(|state| state.is_fetching = true);
            trace!("Fetching");
            let result = fetcher.fetch().await;

            shared.state.send_modify(|state| {
                state.is_fetching = false;
                state.fetch_count += 1;
                match result {
                    Ok(value) => {
                        state.data = Some(value);
                        state.error = None;
                    }
                    Err(e) => {
                        warn!(error = %e, "Fetch failed");
                        state.error = Some(Arc::new(e));
                    }
                }
            });
            debug!(fetch_count = shared.state.borrow().fetch_count, "Query refreshed");
        }
    }
}

impl<T> Drop for SubscribedQuery<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ============================================================================
// Tests
// ============================================================================
