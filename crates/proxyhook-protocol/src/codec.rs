use base64::Engine;
use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::headers::HeaderCollection;
use crate::messages::{
    InboundMessage, MessageType, OutboundMessage, PingId, WebhookBody, WebhookPayload,
};

/// Field names used on the wire
pub mod keys {
    pub const TYPE: &str = "type";
    pub const PASSWORD: &str = "password";
    pub const HEADERS: &str = "headers";
    pub const BUFFER_TEXT: &str = "bufferText";
    pub const BUFFER: &str = "buffer";
    pub const PING_ID: &str = "pingId";
}

/// Maximum websocket frame/message size accepted from the relay (16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Decode one inbound frame (a JSON object) into a message
///
/// A well-formed frame with a type this client does not handle decodes to
/// [`InboundMessage::Unknown`]. LOGIN is client-to-server only, so receiving
/// one is also unknown.
pub fn decode_inbound(frame: &[u8]) -> Result<InboundMessage, DecodeError> {
    let value: Value = serde_json::from_slice(frame)?;
    let Value::Object(mut obj) = value else {
        return Err(DecodeError::NotAnObject);
    };

    let raw_type = match obj.remove(keys::TYPE) {
        Some(Value::String(s)) => s,
        Some(other) => return Err(DecodeError::InvalidType(other)),
        None => return Err(DecodeError::MissingType),
    };

    let message = match MessageType::from_wire(&raw_type) {
        Some(MessageType::Success) => InboundMessage::LoginSuccess,
        Some(MessageType::Failed) => InboundMessage::LoginFailed,
        Some(MessageType::Webhook) => InboundMessage::Webhook(decode_webhook(&mut obj)?),
        Some(MessageType::Ping) => InboundMessage::Ping {
            id: take_ping_id(&mut obj),
        },
        Some(MessageType::Pong) => InboundMessage::Pong {
            id: take_ping_id(&mut obj),
        },
        Some(MessageType::Login) | None => InboundMessage::Unknown { raw_type },
    };

    Ok(message)
}

/// Encode an outbound message as a JSON text frame
pub fn encode_outbound(message: &OutboundMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

fn take_ping_id(obj: &mut Map<String, Value>) -> PingId {
    obj.remove(keys::PING_ID)
        .map(PingId)
        .unwrap_or_else(PingId::missing)
}

fn decode_webhook(obj: &mut Map<String, Value>) -> Result<WebhookPayload, DecodeError> {
    let webhook = MessageType::Webhook.as_str();

    let headers = match obj.remove(keys::HEADERS) {
        None | Some(Value::Null) => HeaderCollection::new(),
        Some(value) => serde_json::from_value(value)
            .map_err(|e| DecodeError::invalid_field(webhook, keys::HEADERS, e))?,
    };

    // bufferText takes precedence when a sender fills in both
    let body = match obj.remove(keys::BUFFER_TEXT) {
        Some(Value::String(text)) => WebhookBody::Text(text),
        Some(Value::Null) | None => match obj.remove(keys::BUFFER) {
            Some(Value::String(encoded)) => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(|e| DecodeError::invalid_field(webhook, keys::BUFFER, e))?;
                WebhookBody::Binary(bytes)
            }
            Some(Value::Null) | None => WebhookBody::Binary(Vec::new()),
            Some(other) => {
                return Err(DecodeError::invalid_field(
                    webhook,
                    keys::BUFFER,
                    format!("expected base64 string, got {}", other),
                ))
            }
        },
        Some(other) => {
            return Err(DecodeError::invalid_field(
                webhook,
                keys::BUFFER_TEXT,
                format!("expected string, got {}", other),
            ))
        }
    };

    Ok(WebhookPayload { headers, body })
}
