//! Typed wire messages.
//!
//! Every message is a JSON object tagged by `messageType`:
//!
//! | `messageType` | Direction | Fields |
//! |---------------|-----------|--------|
//! | `subscribeRequest` | client → server | `requestID`, `urlPath`, `queryParams`? |
//! | `subscribeResponse` | server → client | `requestID`, `subscriptionID` |
//! | `unsubscribeRequest` | client → server | `requestID`, `subscriptionID` |
//! | `subscriptionNotification` | server → client | `subscriptionID` |
//!
//! `requestID` on outbound frames is attached by [`Request`](super::Request).

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identifiers::{RequestId, SubscriptionId};

// ============================================================================
// MessageKind
// ============================================================================

/// Discriminator values of the `messageType` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// Client asks to watch a resource path.
    #[serde(rename = "subscribeRequest")]
    SubscribeRequest,
    /// Server acknowledges a subscribe request.
    #[serde(rename = "subscribeResponse")]
    SubscribeResponse,
    /// Client stops watching.
    #[serde(rename = "unsubscribeRequest")]
    UnsubscribeRequest,
    /// Server says a watched resource may have changed.
    #[serde(rename = "subscriptionNotification")]
    SubscriptionNotification,
}

impl MessageKind {
    /// Returns the wire name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SubscribeRequest => "subscribeRequest",
            Self::SubscribeResponse => "subscribeResponse",
            Self::UnsubscribeRequest => "unsubscribeRequest",
            Self::SubscriptionNotification => "subscriptionNotification",
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "subscribeRequest" => Some(Self::SubscribeRequest),
            "subscribeResponse" => Some(Self::SubscribeResponse),
            "unsubscribeRequest" => Some(Self::UnsubscribeRequest),
            "subscriptionNotification" => Some(Self::SubscriptionNotification),
            _ => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SubscriptionTarget
// ============================================================================

/// A query parameter attached to a subscribed path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryParam {
    /// Parameter name.
    pub name: String,
    /// Parameter value.
    pub value: String,
}

/// The server-side resource a subscription watches.
///
/// # Example
///
/// ```
/// use bolts_client::SubscriptionTarget;
///
/// let target = SubscriptionTarget::new(["posts"]).with_query("fieldSet", "titlesOnly");
/// assert_eq!(target.to_string(), "/posts?fieldSet=titlesOnly");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionTarget {
    /// Ordered path segments.
    #[serde(rename = "urlPath")]
    pub url_path: Vec<String>,

    /// Optional query parameters.
    #[serde(
        rename = "queryParams",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub query_params: Vec<QueryParam>,
}

impl SubscriptionTarget {
    /// Creates a target from path segments.
    #[must_use]
    pub fn new<I, S>(url_path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            url_path: url_path.into_iter().map(Into::into).collect(),
            query_params: Vec::new(),
        }
    }

    /// Adds a query parameter.
    #[inline]
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push(QueryParam {
            name: name.into(),
            value: value.into(),
        });
        self
    }
}

impl fmt::Display for SubscriptionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.url_path {
            write!(f, "/{segment}")?;
        }
        if self.url_path.is_empty() {
            f.write_str("/")?;
        }
        for (i, param) in self.query_params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{}={}", param.name, param.value)?;
        }
        Ok(())
    }
}

impl<const N: usize> From<[&str; N]> for SubscriptionTarget {
    fn from(path: [&str; N]) -> Self {
        Self::new(path)
    }
}

impl From<&[&str]> for SubscriptionTarget {
    fn from(path: &[&str]) -> Self {
        Self::new(path.iter().copied())
    }
}

impl From<Vec<String>> for SubscriptionTarget {
    fn from(url_path: Vec<String>) -> Self {
        Self {
            url_path,
            query_params: Vec::new(),
        }
    }
}

// ============================================================================
// ClientRequest
// ============================================================================

/// A message the client sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "messageType")]
pub enum ClientRequest {
    /// Open a subscription.
    #[serde(rename = "subscribeRequest")]
    Subscribe(SubscriptionTarget),

    /// Close a subscription.
    #[serde(rename = "unsubscribeRequest")]
    Unsubscribe {
        /// Subscription to close.
        #[serde(rename = "subscriptionID")]
        subscription_id: SubscriptionId,
    },
}

impl ClientRequest {
    /// Creates a subscribe request.
    #[inline]
    #[must_use]
    pub fn subscribe(target: impl Into<SubscriptionTarget>) -> Self {
        Self::Subscribe(target.into())
    }

    /// Creates an unsubscribe request.
    #[inline]
    #[must_use]
    pub fn unsubscribe(subscription_id: SubscriptionId) -> Self {
        Self::Unsubscribe { subscription_id }
    }

    /// Returns this request's message kind.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::Subscribe(_) => MessageKind::SubscribeRequest,
            Self::Unsubscribe { .. } => MessageKind::UnsubscribeRequest,
        }
    }

    /// Returns the kind of the direct response, if the protocol defines one.
    ///
    /// `unsubscribeRequest` has no response.
    #[inline]
    #[must_use]
    pub const fn expected_response(&self) -> Option<MessageKind> {
        match self {
            Self::Subscribe(_) => Some(MessageKind::SubscribeResponse),
            Self::Unsubscribe { .. } => None,
        }
    }
}

// ============================================================================
// ServerMessage
// ============================================================================

/// A message the server sends.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "messageType")]
pub enum ServerMessage {
    /// Acknowledges a subscribe request.
    #[serde(rename = "subscribeResponse")]
    SubscribeResponse {
        /// Echo of the request ID.
        #[serde(rename = "requestID")]
        request_id: RequestId,
        /// Server-assigned subscription ID.
        #[serde(rename = "subscriptionID")]
        subscription_id: SubscriptionId,
    },

    /// Unsolicited change signal.
    #[serde(rename = "subscriptionNotification")]
    SubscriptionNotification {
        /// Subscription the signal belongs to.
        #[serde(rename = "subscriptionID")]
        subscription_id: SubscriptionId,
    },
}

impl ServerMessage {
    /// Returns this message's kind.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::SubscribeResponse { .. } => MessageKind::SubscribeResponse,
            Self::SubscriptionNotification { .. } => MessageKind::SubscriptionNotification,
        }
    }

    /// Returns the echoed request ID, if this is a direct response.
    #[inline]
    #[must_use]
    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            Self::SubscribeResponse { request_id, .. } => Some(request_id),
            Self::SubscriptionNotification { .. } => None,
        }
    }

    /// Returns the subscription ID carried by the message.
    #[inline]
    #[must_use]
    pub fn subscription_id(&self) -> &SubscriptionId {
        match self {
            Self::SubscribeResponse {
                subscription_id, ..
            }
            | Self::SubscriptionNotification { subscription_id } => subscription_id,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
