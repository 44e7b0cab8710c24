//! Hand-driven subscription stack for tests.

use std::sync::Arc;

use serde_json::{Value, json};

use crate::correlator::{CorrelatorConfig, RequestCorrelator};
use crate::identifiers::ConnectionEpoch;
use crate::transport::ConnectionListener;
use crate::transport::mock::RecordingSink;

use super::SubscriptionManager;

/// Drives a manager by hand, playing both the connection and the server.
pub(crate) struct Harness {
    pub(crate) sink: Arc<RecordingSink>,
    pub(crate) correlator: Arc<RequestCorrelator>,
    pub(crate) manager: Arc<SubscriptionManager>,
    pub(crate) epoch: ConnectionEpoch,
    next_sid: usize,
}

impl Harness {
    /// Builds the stack with a socket already open.
    pub(crate) fn new() -> Self {
        let sink = RecordingSink::new();
        let correlator = RequestCorrelator::new(sink.clone(), CorrelatorConfig::default());
        let manager = SubscriptionManager::new(Arc::clone(&correlator));
        let mut harness = Self {
            sink,
            correlator,
            manager,
            epoch: ConnectionEpoch::next(),
            next_sid: 0,
        };
        harness.open();
        harness
    }

    pub(crate) fn open(&mut self) {
        self.epoch = ConnectionEpoch::next();
        self.sink.open(self.epoch);
        self.manager.on_open(self.epoch);
    }

    pub(crate) fn close(&mut self) {
        self.sink.close();
        self.correlator.on_close(self.epoch);
        self.manager.on_close(self.epoch);
        // Frames in flight on the dead socket are lost.
        self.sink.take_sent();
    }

    pub(crate) fn reconnect(&mut self) {
        self.close();
        self.open();
    }

    pub(crate) fn deliver(&self, frame: Value) {
        let raw = frame.to_string();
        self.correlator.on_message(self.epoch, &raw);
        self.manager.on_message(self.epoch, &raw);
    }

    pub(crate) fn notify(&self, subscription_id: &str) {
        self.deliver(json!({
            "messageType": "subscriptionNotification",
            "subscriptionID": subscription_id,
        }));
    }

    /// Acknowledges every subscribe sent so far. Returns `(path, sid)`.
    pub(crate) fn ack_all(&mut self) -> Vec<(String, String)> {
        let mut acked = Vec::new();
        for frame in self.sink.take_sent() {
            if frame["messageType"] != "subscribeRequest" {
                continue;
            }
            self.next_sid += 1;
            let sid = format!("s{}", self.next_sid);
            let path = frame["urlPath"][0].as_str().unwrap_or_default().to_string();
            self.deliver(json!({
                "messageType": "subscribeResponse",
                "requestID": frame["requestID"],
                "subscriptionID": sid,
            }));
            acked.push((path, sid));
        }
        acked
    }
}
