//! Subscription multiplexer.
//!
//! Many logical subscriptions share one socket. The manager keeps:
//!
//! - one entry per live [`Subscription`], keyed by a local key
//! - a route table from server [`SubscriptionId`] to entry, valid for the
//!   current socket only
//!
//! The route table is cleared on every close and rebuilt from
//! acknowledgments after every open, so a notification carrying an ID from
//! an earlier socket or a torn-down subscription finds no route.
//!
//! # Teardown while pending
//!
//! The unsubscribe is queued until the acknowledgment arrives. The entry is
//! removed and its callback detached at once; when the acknowledgment for
//! that subscribe request comes back on the same socket, an
//! `unsubscribeRequest` for the returned ID is sent immediately. If the socket
//! closes first the server has already forgotten the subscription.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, info, trace, warn};

use crate::correlator::RequestCorrelator;
use crate::error::Result;
use crate::identifiers::{ConnectionEpoch, RequestId, SubscriptionId};
use crate::protocol::{
    ClientRequest, Inbound, MessageKind, Request, ServerMessage, SubscriptionTarget,
};
use crate::transport::ConnectionListener;

use super::handle::{Slot, Subscription};
use super::status::SubscriptionStatus;

// ============================================================================
// Types
// ============================================================================

/// Local identity of a subscription, stable across reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SubscriptionKey(u64);

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-subscription bookkeeping.
struct Entry {
    slot: Arc<Slot>,
    /// Server ID for the current socket.
    subscription_id: Option<SubscriptionId>,
    /// Outstanding subscribe request.
    pending_request: Option<RequestId>,
}

#[derive(Default)]
struct Registry {
    /// Epoch of the open socket.
    epoch: Option<ConnectionEpoch>,
    entries: FxHashMap<SubscriptionKey, Entry>,
    routes: FxHashMap<SubscriptionId, SubscriptionKey>,
}

// ============================================================================
// SubscriptionManager
// ============================================================================

/// Owns every subscription multiplexed over one connection.
///
/// Register it as a [`ConnectionListener`] after the correlator.
pub struct SubscriptionManager {
    this: Weak<Self>,
    correlator: Arc<RequestCorrelator>,
    registry: Mutex<Registry>,
    next_key: AtomicU64,
}

impl fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("subscriptions", &self.len())
            .field("active", &self.active_count())
            .finish_non_exhaustive()
    }
}

impl SubscriptionManager {
    /// Creates a manager that subscribes through `correlator`.
    #[must_use]
    pub fn new(correlator: Arc<RequestCorrelator>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            correlator,
            registry: Mutex::new(Registry::default()),
            next_key: AtomicU64::new(1),
        })
    }

    /// Starts watching `target`.
    ///
    /// `on_invalidate` runs on the transport task whenever the resource must
    /// be refetched: on every notification and on every transition to
    /// [`SubscriptionStatus::Active`]. It must not block.
    pub fn subscribe(
        &self,
        target: impl Into<SubscriptionTarget>,
        on_invalidate: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        let key = SubscriptionKey(self.next_key.fetch_add(1, Ordering::Relaxed));
        let slot = Slot::new(target.into(), Box::new(on_invalidate));

        let mut entry = Entry {
            slot: Arc::clone(&slot),
            subscription_id: None,
            pending_request: None,
        };

        {
            let mut registry = self.registry.lock();
            if let Some(epoch) = registry.epoch {
                self.send_subscribe(key, &mut entry, epoch);
            }
            registry.entries.insert(key, entry);
        }

        debug!(%key, target = %slot.target(), status = %slot.status(), "Subscription created");
        Subscription::new(key, slot, self.this.clone())
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.lock().entries.len()
    }

    /// Returns `true` if nothing is watched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.lock().entries.is_empty()
    }

    /// Number of subscriptions currently active.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.registry
            .lock()
            .entries
            .values()
            .filter(|entry| entry.slot.status().is_active())
            .count()
    }

    pub(crate) fn subscription_id(&self, key: SubscriptionKey) -> Option<SubscriptionId> {
        self.registry
            .lock()
            .entries
            .get(&key)
            .and_then(|entry| entry.subscription_id.clone())
    }

    /// Removes a subscription; the callback is detached before this returns.
    pub(crate) fn teardown(&self, key: SubscriptionKey) {
        let (entry, epoch) = {
            let mut guard = self.registry.lock();
            let registry = &mut *guard;
            let Some(entry) = registry.entries.remove(&key) else {
                return;
            };
            if let Some(subscription_id) = &entry.subscription_id {
                registry.routes.remove(subscription_id);
            }
            (entry, registry.epoch)
        };

        entry.slot.close();

        match (entry.subscription_id, epoch) {
            (Some(subscription_id), Some(epoch)) => {
                debug!(%key, %subscription_id, "Unsubscribing");
                if let Err(e) = self
                    .correlator
                    .send_oneway(epoch, ClientRequest::unsubscribe(subscription_id.clone()))
                {
                    warn!(%subscription_id, error = %e, "Unsubscribe failed");
                }
            }
            _ if entry.pending_request.is_some() => {
                debug!(%key, "Unsubscribe deferred until acknowledged");
            }
            _ => debug!(%key, "Subscription removed"),
        }
    }

    /// Sends a subscribe request for `entry` on `epoch`.
    fn send_subscribe(&self, key: SubscriptionKey, entry: &mut Entry, epoch: ConnectionEpoch) {
        let request = Request::new(ClientRequest::subscribe(entry.slot.target().clone()));
        let request_id = request.id.clone();

        let this = self.this.clone();
        let acked_id = request_id.clone();
        let dispatched = self.correlator.dispatch(epoch, request, move |result| {
            if let Some(manager) = this.upgrade() {
                manager.on_subscribe_complete(key, epoch, &acked_id, result);
            }
        });

        match dispatched {
            Ok(_) => {
                entry.pending_request = Some(request_id);
                entry.slot.set_status(SubscriptionStatus::Pending);
                trace!(%key, target = %entry.slot.target(), %epoch, "Subscribe sent");
            }
            Err(e) => {
                entry.pending_request = None;
                entry.slot.set_status(SubscriptionStatus::Disconnected);
                warn!(%key, error = %e, "Subscribe not sent, retrying on reconnect");
            }
        }
    }

    /// Applies a subscribe acknowledgment or failure.
    fn on_subscribe_complete(
        &self,
        key: SubscriptionKey,
        epoch: ConnectionEpoch,
        request_id: &RequestId,
        result: Result<ServerMessage>,
    ) {
        let mut guard = self.registry.lock();
        let registry = &mut *guard;
        let current = registry.epoch == Some(epoch);

        let Some(entry) = registry.entries.get_mut(&key) else {
            drop(guard);
            if let Ok(message) = result
                && current
            {
                self.release_orphan(epoch, message.subscription_id().clone());
            }
            return;
        };

        if entry.pending_request.as_ref() != Some(request_id) {
            trace!(%key, %request_id, "Ignoring superseded acknowledgment");
            return;
        }
        entry.pending_request = None;

        match result {
            Ok(message) if current => {
                let subscription_id = message.subscription_id().clone();
                entry.subscription_id = Some(subscription_id.clone());
                registry.routes.insert(subscription_id.clone(), key);
                let slot = Arc::clone(&entry.slot);
                drop(guard);

                slot.set_status(SubscriptionStatus::Active);
                info!(%key, %subscription_id, target = %slot.target(), "Subscription active");
                slot.notify();
            }
            Ok(_) => trace!(%key, "Acknowledgment for closed socket ignored"),
            Err(e) if e.is_protocol_violation() => {
                warn!(%key, target = %entry.slot.target(), error = %e, "Subscription failed");
                entry.slot.fail(e.to_string());
            }
            Err(e) => {
                debug!(%key, error = %e, "Subscribe interrupted");
                entry.slot.set_status(SubscriptionStatus::Disconnected);
            }
        }
    }

    /// Unsubscribes an acknowledgment that arrived after teardown.
    fn release_orphan(&self, epoch: ConnectionEpoch, subscription_id: SubscriptionId) {
        debug!(%subscription_id, "Releasing subscription acknowledged after teardown");
        if let Err(e) = self
            .correlator
            .send_oneway(epoch, ClientRequest::unsubscribe(subscription_id.clone()))
        {
            warn!(%subscription_id, error = %e, "Unsubscribe failed");
        }
    }

    /// Routes a notification to its live subscription.
    fn route(&self, epoch: ConnectionEpoch, subscription_id: &SubscriptionId) {
        let slot = {
            let registry = self.registry.lock();
            if registry.epoch != Some(epoch) {
                return;
            }
            registry
                .routes
                .get(subscription_id)
                .and_then(|key| registry.entries.get(key))
                .map(|entry| Arc::clone(&entry.slot))
        };

        match slot {
            Some(slot) => {
                trace!(%subscription_id, "Notification");
                slot.notify();
            }
            None => debug!(%subscription_id, "Notification for unknown subscription dropped"),
        }
    }
}

impl ConnectionListener for SubscriptionManager {
    fn on_open(&self, epoch: ConnectionEpoch) {
        let mut guard = self.registry.lock();
        let registry = &mut *guard;
        registry.epoch = Some(epoch);
        registry.routes.clear();

        let mut resubscribed = 0usize;
        for (key, entry) in &mut registry.entries {
            if entry.slot.status().is_terminal() {
                continue;
            }
            entry.subscription_id = None;
            self.send_subscribe(*key, entry, epoch);
            resubscribed += 1;
        }

        if resubscribed > 0 {
            debug!(%epoch, count = resubscribed, "Resubscribing");
        }
    }

    fn on_close(&self, epoch: ConnectionEpoch) {
        let mut guard = self.registry.lock();
        let registry = &mut *guard;
        registry.epoch = None;
        registry.routes.clear();

        for entry in registry.entries.values_mut() {
            entry.subscription_id = None;
            entry.pending_request = None;
            if !entry.slot.status().is_terminal() {
                entry.slot.set_status(SubscriptionStatus::Disconnected);
            }
        }

        trace!(%epoch, count = registry.entries.len(), "Subscriptions disconnected");
    }

    fn on_message(&self, epoch: ConnectionEpoch, raw: &str) {
        let Some(inbound) = Inbound::parse(raw) else {
            return;
        };
        if inbound.envelope.message_type != MessageKind::SubscriptionNotification.as_str() {
            return;
        }

        match inbound.into_message() {
            Ok(ServerMessage::SubscriptionNotification { subscription_id }) => {
                self.route(epoch, &subscription_id);
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "Ignoring malformed notification"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, AtomicUsize};

    use proptest::prelude::*;
    use serde_json::{Value, json};

    use crate::error::Error;
    use crate::subscription::testing::Harness;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let callback = {
            let count = Arc::clone(&count);
            move || {
                count.fetch_add(1, Ordering::SeqCst);
            }
        };
        (count, callback)
    }

    fn unsubscribes(frames: &[Value]) -> Vec<String> {
        frames
            .iter()
            .filter(|frame| frame["messageType"] == "unsubscribeRequest")
            .map(|frame| frame["subscriptionID"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_subscribe_ack_activates_and_invalidates_once() {
        let mut harness = Harness::new();
        let (count, callback) = counter();

        let subscription = harness.manager.subscribe(["motd"], callback);
        assert_eq!(subscription.status(), SubscriptionStatus::Pending);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        let acked = harness.ack_all();
        assert_eq!(acked, vec![("motd".to_string(), "s1".to_string())]);
        assert_eq!(subscription.status(), SubscriptionStatus::Active);
        assert_eq!(subscription.subscription_id(), Some(SubscriptionId::from("s1")));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(harness.manager.active_count(), 1);
    }

    #[test]
    fn test_motd_reconnect_scenario() {
        let mut harness = Harness::new();
        let (count, callback) = counter();
        let subscription = harness.manager.subscribe(["motd"], callback);

        harness.ack_all();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        harness.notify("s1");
        assert_eq!(count.load(Ordering::SeqCst), 2);

        harness.close();
        assert_eq!(subscription.status(), SubscriptionStatus::Disconnected);
        assert_eq!(subscription.subscription_id(), None);

        harness.open();
        assert_eq!(subscription.status(), SubscriptionStatus::Pending);
        let acked = harness.ack_all();
        assert_eq!(acked[0].1, "s2");
        assert_eq!(subscription.status(), SubscriptionStatus::Active);
        assert_eq!(count.load(Ordering::SeqCst), 3);

        // Stray notification for the superseded ID.
        harness.notify("s1");
        assert_eq!(count.load(Ordering::SeqCst), 3);

        harness.notify("s2");
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_subscribe_while_disconnected_waits_for_open() {
        let mut harness = Harness::new();
        harness.close();

        let (count, callback) = counter();
        let subscription = harness.manager.subscribe(["motd"], callback);
        assert_eq!(subscription.status(), SubscriptionStatus::Disconnected);
        assert_eq!(harness.sink.sent_len(), 0);

        harness.open();
        assert_eq!(subscription.status(), SubscriptionStatus::Pending);
        harness.ack_all();
        assert_eq!(subscription.status(), SubscriptionStatus::Active);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_teardown_active_sends_unsubscribe() {
        let mut harness = Harness::new();
        let (count, callback) = counter();
        let subscription = harness.manager.subscribe(["motd"], callback);
        harness.ack_all();

        drop(subscription);
        let frames = harness.sink.take_sent();
        assert_eq!(unsubscribes(&frames), vec!["s1".to_string()]);
        assert!(harness.manager.is_empty());

        harness.notify("s1");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_teardown_while_pending_unsubscribes_after_ack() {
        let harness = Harness::new();
        let (count, callback) = counter();
        let subscription = harness.manager.subscribe(["motd"], callback);

        subscription.close();
        // Nothing to unsubscribe yet: no ID known.
        let frames = harness.sink.take_sent();
        assert!(unsubscribes(&frames).is_empty());

        // Acknowledge the subscribe that was already on the wire.
        let subscribe = frames
            .iter()
            .find(|frame| frame["messageType"] == "subscribeRequest")
            .expect("subscribe frame");
        harness.deliver(json!({
            "messageType": "subscribeResponse",
            "requestID": subscribe["requestID"],
            "subscriptionID": "s9",
        }));

        let frames = harness.sink.take_sent();
        assert_eq!(unsubscribes(&frames), vec!["s9".to_string()]);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_teardown_while_pending_then_close_sends_nothing() {
        let harness = Harness::new();
        let (_count, callback) = counter();
        let subscription = harness.manager.subscribe(["motd"], callback);
        drop(subscription);

        harness.sink.close();
        harness.correlator.on_close(harness.epoch);
        harness.manager.on_close(harness.epoch);

        let frames = harness.sink.take_sent();
        assert!(unsubscribes(&frames).is_empty());
        assert_eq!(harness.correlator.pending_count(), 0);
    }

    #[test]
    fn test_wrong_kind_ack_fails_terminally() {
        let mut harness = Harness::new();
        let (count, callback) = counter();
        let subscription = harness.manager.subscribe(["motd"], callback);

        let frames = harness.sink.take_sent();
        harness.deliver(json!({
            "messageType": "subscriptionNotification",
            "requestID": frames[0]["requestID"],
            "subscriptionID": "s1",
        }));

        assert_eq!(subscription.status(), SubscriptionStatus::Failed);
        let err = subscription.check().expect_err("failed");
        assert!(matches!(err, Error::SubscriptionFailed { ref path, .. } if path == "/motd"));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        // Failed survives reconnects and is never resubscribed.
        harness.reconnect();
        assert_eq!(subscription.status(), SubscriptionStatus::Failed);
        assert_eq!(harness.sink.sent_len(), 0);
    }

    #[test]
    fn test_malformed_ack_fails() {
        let harness = Harness::new();
        let (_count, callback) = counter();
        let subscription = harness.manager.subscribe(["motd"], callback);

        let frames = harness.sink.take_sent();
        harness.deliver(json!({
            "messageType": "subscribeResponse",
            "requestID": frames[0]["requestID"],
        }));

        assert_eq!(subscription.status(), SubscriptionStatus::Failed);
        assert!(subscription.check().is_err());
    }

    #[test]
    fn test_close_while_pending_resubscribes_on_open() {
        let mut harness = Harness::new();
        let (count, callback) = counter();
        let subscription = harness.manager.subscribe(["motd"], callback);

        harness.reconnect();
        assert_eq!(subscription.status(), SubscriptionStatus::Pending);
        assert_eq!(harness.correlator.pending_count(), 1);

        harness.ack_all();
        assert_eq!(subscription.status(), SubscriptionStatus::Active);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reconnect_invalidates_once_per_watched_path() {
        let mut harness = Harness::new();
        let counters: Vec<_> = (0..3).map(|_| counter()).collect();
        let mut subscriptions = Vec::new();
        let mut counts = Vec::new();
        for (i, (count, callback)) in counters.into_iter().enumerate() {
            subscriptions.push(harness.manager.subscribe([format!("p{i}").as_str()], callback));
            counts.push(count);
        }
        harness.ack_all();

        // Many notifications missed while disconnected.
        harness.close();
        for sid in ["s1", "s2", "s3", "s1"] {
            harness.notify(sid);
        }
        let before: usize = counts.iter().map(|c| c.load(Ordering::SeqCst)).sum();

        harness.open();
        harness.ack_all();
        let after: usize = counts.iter().map(|c| c.load(Ordering::SeqCst)).sum();
        assert_eq!(after - before, subscriptions.len());
    }

    #[test]
    fn test_subscriptions_beyond_request_limit_all_activate() {
        let mut harness = Harness::new();
        let watched = harness.correlator.config().max_pending + 5;
        let subscriptions: Vec<_> = (0..watched)
            .map(|i| harness.manager.subscribe([format!("p{i}").as_str()], || {}))
            .collect();

        assert!(
            subscriptions
                .iter()
                .all(|s| s.status() == SubscriptionStatus::Pending)
        );
        assert_eq!(harness.ack_all().len(), watched);
        assert_eq!(harness.manager.active_count(), watched);

        // Every path is resubscribed at once after a reconnect.
        harness.reconnect();
        assert_eq!(harness.ack_all().len(), watched);
        assert_eq!(harness.manager.active_count(), watched);
        assert_eq!(harness.correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_subscribe_while_requests_saturate_limit() {
        let mut harness = Harness::new();
        let limit = harness.correlator.config().max_pending;
        let requests: Vec<_> = (0..limit)
            .map(|_| {
                let correlator = Arc::clone(&harness.correlator);
                tokio::spawn(async move { correlator.request(ClientRequest::subscribe(["busy"])).await })
            })
            .collect();
        while harness.correlator.pending_count() < limit {
            tokio::task::yield_now().await;
        }
        harness.sink.take_sent();

        let (count, callback) = counter();
        let subscription = harness.manager.subscribe(["motd"], callback);
        assert_eq!(subscription.status(), SubscriptionStatus::Pending);

        harness.ack_all();
        assert_eq!(subscription.status(), SubscriptionStatus::Active);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        for request in requests {
            request.abort();
        }
    }

    #[test]
    fn test_garbage_frames_do_not_disturb() {
        let mut harness = Harness::new();
        let (count, callback) = counter();
        let _subscription = harness.manager.subscribe(["motd"], callback);
        harness.ack_all();

        for raw in ["", "null", "{\"messageType\":\"subscriptionNotification\"}", "{\"x\":1}"] {
            harness.correlator.on_message(harness.epoch, raw);
            harness.manager.on_message(harness.epoch, raw);
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropping_subscription_inside_callback() {
        let mut harness = Harness::new();
        let holder: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicUsize::new(0));

        let subscription = harness.manager.subscribe(["motd"], {
            let holder = Arc::clone(&holder);
            let calls = Arc::clone(&calls);
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                let taken = holder.lock().take();
                drop(taken);
            }
        });
        *holder.lock() = Some(subscription);

        harness.ack_all();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(harness.manager.is_empty());

        harness.notify("s1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    // ------------------------------------------------------------------------
    // Interleavings
    // ------------------------------------------------------------------------

    #[derive(Debug, Clone)]
    enum Op {
        Subscribe,
        Teardown(usize),
        AckAll,
        NotifyAll,
        Reconnect,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => Just(Op::Subscribe),
            2 => (0usize..8).prop_map(Op::Teardown),
            3 => Just(Op::AckAll),
            3 => Just(Op::NotifyAll),
            1 => Just(Op::Reconnect),
        ]
    }

    struct Watched {
        subscription: Option<Subscription>,
        count: Arc<AtomicUsize>,
        torn: Arc<AtomicBool>,
    }

    proptest! {
        #[test]
        fn test_interleavings_respect_teardown_and_reconnect(ops in proptest::collection::vec(op(), 1..60)) {
            let mut harness = Harness::new();
            let violations = Arc::new(AtomicUsize::new(0));
            let mut watched: Vec<Watched> = Vec::new();
            let mut issued: Vec<String> = Vec::new();

            for op in ops {
                match op {
                    Op::Subscribe => {
                        let count = Arc::new(AtomicUsize::new(0));
                        let torn = Arc::new(AtomicBool::new(false));
                        let path = format!("p{}", watched.len());
                        let subscription = harness.manager.subscribe([path.as_str()], {
                            let count = Arc::clone(&count);
                            let torn = Arc::clone(&torn);
                            let violations = Arc::clone(&violations);
                            move || {
                                if torn.load(Ordering::SeqCst) {
                                    violations.fetch_add(1, Ordering::SeqCst);
                                }
                                count.fetch_add(1, Ordering::SeqCst);
                            }
                        });
                        watched.push(Watched { subscription: Some(subscription), count, torn });
                    }
                    Op::Teardown(index) => {
                        if let Some(entry) = watched.get_mut(index) {
                            entry.torn.store(true, Ordering::SeqCst);
                            entry.subscription.take();
                        }
                    }
                    Op::AckAll => {
                        let before: Vec<usize> =
                            watched.iter().map(|w| w.count.load(Ordering::SeqCst)).collect();
                        let acked = harness.ack_all();

                        for (path, sid) in &acked {
                            issued.push(sid.clone());
                            let index: usize = path.trim_start_matches('p').parse().unwrap_or(usize::MAX);
                            let Some(entry) = watched.get(index) else { continue };
                            let delta = entry.count.load(Ordering::SeqCst) - before[index];
                            let expected = usize::from(entry.subscription.is_some());
                            prop_assert_eq!(delta, expected, "ack of {} invalidates once", path);
                        }
                    }
                    Op::NotifyAll => {
                        let before: Vec<usize> =
                            watched.iter().map(|w| w.count.load(Ordering::SeqCst)).collect();
                        for sid in &issued {
                            harness.notify(sid);
                        }
                        for (index, entry) in watched.iter().enumerate() {
                            let delta = entry.count.load(Ordering::SeqCst) - before[index];
                            let expected = entry
                                .subscription
                                .as_ref()
                                .map_or(0, |s| usize::from(s.status().is_active()));
                            prop_assert_eq!(delta, expected, "one delivery per current ID");
                        }
                    }
                    Op::Reconnect => harness.reconnect(),
                }

                prop_assert_eq!(violations.load(Ordering::SeqCst), 0);
            }

            let live = watched.iter().filter(|w| w.subscription.is_some()).count();
            prop_assert_eq!(harness.manager.len(), live);
        }
    }
}
