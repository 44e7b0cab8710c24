//! Request/response correlation.
//!
//! Every outbound request gets a fresh [`RequestId`] and an entry in the
//! correlation table. Inbound frames echoing that ID complete the entry
//! exactly once:
//!
//! | Inbound frame | Outcome |
//! |---------------|---------|
//! | expected `messageType`, valid body | `Ok(ServerMessage)` |
//! | other `messageType` | [`Error::UnexpectedResponseKind`] |
//! | expected `messageType`, invalid body | [`Error::MalformedResponse`] |
//! | unknown or missing `requestID` | ignored |
//! | socket closed | [`Error::ConnectionClosed`] |
//!
//! Entries are removed before completion runs, so a late duplicate response
//! finds nothing and is ignored.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{ConnectionEpoch, RequestId};
use crate::protocol::{ClientRequest, Inbound, MessageKind, Request, ServerMessage};
use crate::transport::{ConnectionListener, FrameSink};

// ============================================================================
// Constants
// ============================================================================

/// Maximum pending requests before rejecting new ones.
pub const MAX_PENDING_REQUESTS: usize = 100;

/// Default timeout for waiting on an open socket.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for a correlated response.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Types
// ============================================================================

/// Callback completion, run on the transport task.
pub(crate) type CompletionCallback = Box<dyn FnOnce(Result<ServerMessage>) + Send>;

/// How a pending request is completed.
enum Completion {
    /// An awaiting [`RequestCorrelator::request`] call.
    Channel(oneshot::Sender<Result<ServerMessage>>),
    /// An internal consumer that must observe the result in inbound order.
    Callback(CompletionCallback),
}

impl Completion {
    /// Counts toward `max_pending`.
    const fn is_bounded(&self) -> bool {
        matches!(self, Self::Channel(_))
    }

    fn complete(self, result: Result<ServerMessage>) {
        match self {
            Self::Channel(tx) => {
                let _ = tx.send(result);
            }
            Self::Callback(callback) => callback(result),
        }
    }
}

/// One in-flight request.
struct PendingRequest {
    expected: MessageKind,
    epoch: ConnectionEpoch,
    completion: Completion,
}

/// Map of request IDs to pending entries.
type CorrelationMap = FxHashMap<RequestId, PendingRequest>;

/// Correlator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelatorConfig {
    /// How long `request` waits for an open socket.
    pub connect_timeout: Duration,
    /// How long `request` waits for the response.
    pub request_timeout: Duration,
    /// Limit on in-flight [`RequestCorrelator::request`] calls.
    ///
    /// Subscribe acknowledgments awaited by the subscription manager are
    /// bounded by the number of live subscriptions and do not count.
    pub max_pending: usize,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_pending: MAX_PENDING_REQUESTS,
        }
    }
}

// ============================================================================
// RequestCorrelator
// ============================================================================

/// Matches responses to requests over one shared connection.
///
/// Register it as a [`ConnectionListener`] so it sees inbound frames and
/// socket closure.
pub struct RequestCorrelator {
    /// Outbound side of the connection.
    sink: Arc<dyn FrameSink>,
    /// Pending requests by ID.
    correlation: Mutex<CorrelationMap>,
    /// Settings.
    config: CorrelatorConfig,
}

impl fmt::Debug for RequestCorrelator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCorrelator")
            .field("pending", &self.pending_count())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RequestCorrelator {
    /// Creates a correlator sending through `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn FrameSink>, config: CorrelatorConfig) -> Arc<Self> {
        Arc::new(Self {
            sink,
            correlation: Mutex::new(CorrelationMap::default()),
            config,
        })
    }

    /// Returns the settings.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &CorrelatorConfig {
        &self.config
    }

    /// Returns the number of pending requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.correlation.lock().len()
    }

    /// Sends a request and waits for its correlated response.
    ///
    /// Dropping the returned future abandons the request; a response that
    /// arrives afterwards is ignored.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the request has no response or too many are pending
    /// - [`Error::ConnectionClosed`] if the connection is closed or closes meanwhile
    /// - [`Error::ConnectionTimeout`] if no socket opens within `connect_timeout`
    /// - [`Error::RequestTimeout`] if no response arrives within `request_timeout`
    /// - [`Error::UnexpectedResponseKind`] / [`Error::MalformedResponse`] on a
    ///   response of the wrong shape
    pub async fn request(&self, message: ClientRequest) -> Result<ServerMessage> {
        let expected = Self::expected_response(&message)?;
        let epoch = match self.sink.current_epoch() {
            Some(epoch) => epoch,
            None => self.sink.wait_open(self.config.connect_timeout).await?,
        };

        let request = Request::new(message);
        let request_id = request.id.clone();
        let (response_tx, response_rx) = oneshot::channel();

        self.register(&request_id, expected, epoch, Completion::Channel(response_tx))?;
        let _guard = PendingGuard {
            correlator: self,
            request_id: request_id.clone(),
        };

        self.send_frame(epoch, &request)?;

        match timeout(self.config.request_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                warn!(%request_id, "Request timed out");
                Err(Error::request_timeout(request_id, self.config.request_timeout))
            }
        }
    }

    /// Sends a prepared request on the socket `epoch` and completes
    /// `on_complete` from the transport task, before the next inbound frame
    /// is handled.
    ///
    /// If this returns an error, `on_complete` is dropped without being called.
    pub(crate) fn dispatch(
        &self,
        epoch: ConnectionEpoch,
        request: Request,
        on_complete: impl FnOnce(Result<ServerMessage>) + Send + 'static,
    ) -> Result<RequestId> {
        let expected = Self::expected_response(&request.message)?;
        let request_id = request.id.clone();

        self.register(
            &request_id,
            expected,
            epoch,
            Completion::Callback(Box::new(on_complete)),
        )?;

        if let Err(e) = self.send_frame(epoch, &request) {
            self.correlation.lock().remove(&request_id);
            return Err(e);
        }

        Ok(request_id)
    }

    /// Sends a request that expects no response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if `epoch` is no longer open.
    pub fn send_oneway(&self, epoch: ConnectionEpoch, message: ClientRequest) -> Result<RequestId> {
        let request = Request::new(message);
        self.send_frame(epoch, &request)?;
        Ok(request.id)
    }

    fn expected_response(message: &ClientRequest) -> Result<MessageKind> {
        message.expected_response().ok_or_else(|| {
            Error::protocol(format!("{} has no correlated response", message.kind()))
        })
    }

    fn register(
        &self,
        request_id: &RequestId,
        expected: MessageKind,
        epoch: ConnectionEpoch,
        completion: Completion,
    ) -> Result<()> {
        let mut correlation = self.correlation.lock();

        if completion.is_bounded() {
            let in_flight = correlation
                .values()
                .filter(|pending| pending.completion.is_bounded())
                .count();
            if in_flight >= self.config.max_pending {
                warn!(
                    pending = in_flight,
                    max = self.config.max_pending,
                    "Too many pending requests"
                );
                return Err(Error::protocol(format!(
                    "Too many pending requests: {in_flight}/{}",
                    self.config.max_pending
                )));
            }
        }

        correlation.insert(
            request_id.clone(),
            PendingRequest {
                expected,
                epoch,
                completion,
            },
        );
        Ok(())
    }

    fn send_frame(&self, epoch: ConnectionEpoch, request: &Request) -> Result<()> {
        let text = request.to_text()?;
        self.sink.send_text(epoch, text)?;
        trace!(request_id = %request.id, kind = %request.message.kind(), %epoch, "Request sent");
        Ok(())
    }

    /// Resolves or rejects the pending entry matching `inbound`.
    fn handle_response(&self, inbound: Inbound) {
        let Some(request_id) = inbound.envelope.request_id.clone() else {
            return;
        };

        let Some(pending) = self.correlation.lock().remove(&request_id) else {
            debug!(%request_id, "Response for unknown request ignored");
            return;
        };

        let result = if inbound.envelope.message_type != pending.expected.as_str() {
            warn!(
                %request_id,
                expected = %pending.expected,
                actual = %inbound.envelope.message_type,
                "Unexpected response kind"
            );
            Err(Error::unexpected_response_kind(
                request_id,
                pending.expected,
                inbound.envelope.message_type,
            ))
        } else {
            inbound.into_message().map_err(|e| {
                warn!(%request_id, error = %e, "Malformed response");
                Error::malformed_response(request_id, e.to_string())
            })
        };

        pending.completion.complete(result);
    }

    /// Fails all pending requests with ConnectionClosed error.
    fn fail_pending_requests(&self, epoch: ConnectionEpoch) {
        let pending: Vec<_> = self.correlation.lock().drain().collect();
        let count = pending.len();

        for (request_id, entry) in pending {
            trace!(%request_id, sent_on = %entry.epoch, "Rejecting pending request");
            entry.completion.complete(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, %epoch, "Failed pending requests on close");
        }
    }
}

impl ConnectionListener for RequestCorrelator {
    fn on_message(&self, epoch: ConnectionEpoch, raw: &str) {
        match Inbound::parse(raw) {
            Some(inbound) => self.handle_response(inbound),
            None => trace!(%epoch, "Ignoring frame without envelope"),
        }
    }

    fn on_close(&self, epoch: ConnectionEpoch) {
        self.fail_pending_requests(epoch);
    }
}

// ============================================================================
// PendingGuard
// ============================================================================

/// Removes an abandoned request's entry.
struct PendingGuard<'a> {
    correlator: &'a RequestCorrelator,
    request_id: RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self
            .correlator
            .correlation
            .lock()
            .remove(&self.request_id)
            .is_some()
        {
            trace!(request_id = %self.request_id, "Removed abandoned request");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
