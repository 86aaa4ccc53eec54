//! Canonical envelope union shared by the bus and both SSE endpoints.
//!
//! # Wire Format
//!
//! Envelopes are serialized with a `type` tag:
//!
//! ```json
//! { "type": "event", "id": "…", "timestamp": "…", "event": { "type": "draft_updated", … } }
//! ```

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::provider::{Capability, ProviderDescriptor, ProviderInfo};
use crate::status::BridgeStatusSnapshot;

/// Message attached to an action event when the producer omits one.
pub const DEFAULT_ACTION_MESSAGE: &str = "Action completed";

/// The only payload shape carried by the bus and the downstream stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEnvelope {
    /// Provider identity, capabilities and bridge health.
    Handshake(HandshakeEnvelope),

    /// A domain notification relayed from a producer.
    #[serde(rename = "event")]
    Action(ActionEnvelope),
}

impl StreamEnvelope {
    /// Build a handshake for the given provider.
    pub fn handshake(
        provider: &ProviderDescriptor,
        bridge_status: Option<BridgeStatusSnapshot>,
    ) -> Self {
        Self::Handshake(HandshakeEnvelope {
            id: new_envelope_id(),
            timestamp: Utc::now(),
            provider: provider.info(),
            capabilities: provider.capabilities.clone(),
            bridge_status,
        })
    }

    /// Build an action envelope around a relayed event.
    pub fn action(event: ActionEvent, details: ActionDetails) -> Self {
        Self::Action(ActionEnvelope {
            id: new_envelope_id(),
            timestamp: Utc::now(),
            event,
            message: Some(
                details
                    .message
                    .unwrap_or_else(|| DEFAULT_ACTION_MESSAGE.to_string()),
            ),
            ticket: details.ticket,
            draft: details.draft,
            feedback: details.feedback,
        })
    }

    /// Envelope identifier.
    pub fn id(&self) -> &str {
        match self {
            Self::Handshake(h) => &h.id,
            Self::Action(a) => &a.id,
        }
    }

    /// Returns the handshake body, if this is one.
    pub const fn as_handshake(&self) -> Option<&HandshakeEnvelope> {
        match self {
            Self::Handshake(h) => Some(h),
            Self::Action(_) => None,
        }
    }

    /// Returns the action body, if this is one.
    pub const fn as_action(&self) -> Option<&ActionEnvelope> {
        match self {
            Self::Action(a) => Some(a),
            Self::Handshake(_) => None,
        }
    }
}

/// First frame of every downstream connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeEnvelope {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub provider: ProviderInfo,
    pub capabilities: BTreeSet<Capability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge_status: Option<BridgeStatusSnapshot>,
}

/// A relayed domain notification. Everything except `event.type` is opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEnvelope {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub event: ActionEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Value>,
}

/// The event record inside an action envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

/// Optional attachments carried next to an [`ActionEvent`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionDetails {
    pub message: Option<String>,
    pub ticket: Option<Value>,
    pub draft: Option<Value>,
    pub feedback: Option<Value>,
}

/// Response object handed to the local publish API by same-process producers
/// (webhook handlers, action routes).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<ActionEvent>,
}

impl ActionResponse {
    /// Convert into an action envelope.
    ///
    /// Returns `None` unless the response reports success and carries an event.
    pub fn to_envelope(&self) -> Option<StreamEnvelope> {
        if !self.success {
            return None;
        }
        let event = self.event.clone()?;
        Some(StreamEnvelope::action(
            event,
            ActionDetails {
                message: self.message.clone(),
                ticket: self.ticket.clone(),
                draft: self.draft.clone(),
                feedback: self.feedback.clone(),
            },
        ))
    }
}

fn new_envelope_id() -> String {
    Uuid::new_v4().to_string()
}
