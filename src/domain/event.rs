//! Inbound Lark callback envelopes.
//!
//! Lark posts two kinds of payloads to the callback URL:
//!
//! - the one-off URL verification challenge: `{"type": "url_verification", "token", "challenge"}`
//! - v2 events: `{"schema": "2.0", "header": {"event_type", ...}, "event": {...}}`
//!
//! Encrypted envelopes (`{"encrypt": "..."}`) are rejected.

use serde::Deserialize;
use serde_json::Value;

use super::errors::DispatchError;

/// Event type of a message received by the bot.
pub const MESSAGE_RECEIVE_EVENT: &str = "im.message.receive_v1";

/// Callback type of the URL verification challenge.
pub const URL_VERIFICATION: &str = "url_verification";

/// A classified inbound callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    UrlVerification(UrlVerification),
    MessageReceive(MessageReceive),
    /// A v2 event we have no handler for.
    Other(EventHeader),
}

impl InboundEvent {
    /// Parses and classifies a raw callback body.
    pub fn from_slice(body: &[u8]) -> Result<Self, DispatchError> {
        let envelope: RawEnvelope = serde_json::from_slice(body)
            .map_err(|e| DispatchError::malformed(format!("invalid JSON: {}", e)))?;

        if envelope.encrypt.is_some() {
            return Err(DispatchError::malformed("encrypted events are not supported"));
        }

        if envelope.kind.as_deref() == Some(URL_VERIFICATION) {
            return Ok(InboundEvent::UrlVerification(UrlVerification {
                token: envelope.token.unwrap_or_default(),
                challenge: envelope
                    .challenge
                    .ok_or_else(|| DispatchError::malformed("url_verification without challenge"))?,
            }));
        }

        let header = envelope
            .header
            .ok_or_else(|| DispatchError::malformed("request is not a v2 callback event"))?;

        if header.event_type != MESSAGE_RECEIVE_EVENT {
            return Ok(InboundEvent::Other(header));
        }

        let event = envelope
            .event
            .ok_or_else(|| DispatchError::malformed("message event without payload"))?;
        let body: RawMessageEvent = serde_json::from_value(event)
            .map_err(|e| DispatchError::malformed(format!("unexpected message event shape: {}", e)))?;

        Ok(InboundEvent::MessageReceive(MessageReceive {
            header,
            sender_open_id: body.sender.sender_id.open_id,
            message_type: body.message.message_type,
            content: body.message.content,
        }))
    }

    pub fn event_type(&self) -> &str {
        match self {
            InboundEvent::UrlVerification(_) => URL_VERIFICATION,
            InboundEvent::MessageReceive(m) => &m.header.event_type,
            InboundEvent::Other(header) => &header.event_type,
        }
    }
}

/// URL verification challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlVerification {
    pub token: String,
    pub challenge: String,
}

/// Header shared by all v2 events.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventHeader {
    #[serde(default)]
    pub event_id: Option<String>,
    pub event_type: String,
    #[serde(default)]
    pub token: Option<String>,
}

/// `im.message.receive_v1` reduced to the fields the bot uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageReceive {
    pub header: EventHeader,
    pub sender_open_id: String,
    pub message_type: String,
    /// JSON-encoded message body, e.g. `{"text":"hello"}` for text messages.
    pub content: String,
}

impl MessageReceive {
    pub fn is_text(&self) -> bool {
        self.message_type == "text"
    }
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    challenge: Option<String>,
    #[serde(default)]
    encrypt: Option<String>,
    #[serde(default)]
    header: Option<EventHeader>,
    #[serde(default)]
    event: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawMessageEvent {
    sender: RawSender,
    message: RawMessage,
}

#[derive(Debug, Deserialize)]
struct RawSender {
    sender_id: RawSenderId,
}

#[derive(Debug, Deserialize)]
struct RawSenderId {
    open_id: String,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    message_type: String,
    content: String,
}
