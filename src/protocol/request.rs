//! Outbound request frames and inbound envelopes.
//!
//! [`Request`] attaches a `requestID` to a [`ClientRequest`]. [`Envelope`]
//! is the minimal shape every inbound frame must have before the
//! correlator or the subscription manager will look at it.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::identifiers::RequestId;

use super::{ClientRequest, ServerMessage};

// ============================================================================
// Request
// ============================================================================

/// A client request tagged for correlation.
///
/// # Format
///
/// ```json
/// {
///   "requestID": "req-42",
///   "messageType": "subscribeRequest",
///   "urlPath": ["motd"]
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Unique identifier for request/response correlation.
    #[serde(rename = "requestID")]
    pub id: RequestId,

    /// Message body.
    #[serde(flatten)]
    pub message: ClientRequest,
}

impl Request {
    /// Creates a new request with auto-generated ID.
    #[inline]
    #[must_use]
    pub fn new(message: ClientRequest) -> Self {
        Self {
            id: RequestId::next(),
            message,
        }
    }

    /// Creates a new request with specific ID.
    #[inline]
    #[must_use]
    pub fn with_id(id: RequestId, message: ClientRequest) -> Self {
        Self { id, message }
    }

    /// Serializes the frame to JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// Discriminator and correlation fields of an inbound frame.
///
/// Unknown fields are ignored. A frame that does not even parse as an
/// envelope is dropped by every consumer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Envelope {
    /// Raw `messageType` value.
    #[serde(rename = "messageType")]
    pub message_type: String,

    /// Present on direct responses only.
    #[serde(rename = "requestID", default)]
    pub request_id: Option<RequestId>,
}

/// An inbound frame split into its envelope and raw body.
#[derive(Debug, Clone)]
pub struct Inbound {
    /// Parsed envelope.
    pub envelope: Envelope,
    /// Full frame.
    pub body: Value,
}

impl Inbound {
    /// Parses raw text into an envelope plus body.
    ///
    /// Returns `None` for anything that is not a JSON object carrying a
    /// string `messageType`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let body: Value = serde_json::from_str(text).ok()?;
        let envelope = Envelope::deserialize(&body).ok()?;
        Some(Self { envelope, body })
    }

    /// Validates the body against the typed server schema.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if the body does not match
    /// any known server message.
    pub fn into_message(self) -> Result<ServerMessage> {
        Ok(ServerMessage::deserialize(self.body)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
