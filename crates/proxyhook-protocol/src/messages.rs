use std::fmt;

use serde::{Deserialize, Serialize};

use crate::headers::HeaderCollection;

/// Message type discriminators as they appear in the `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Login,
    Success,
    Failed,
    Webhook,
    Ping,
    Pong,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Login => "LOGIN",
            MessageType::Success => "SUCCESS",
            MessageType::Failed => "FAILED",
            MessageType::Webhook => "WEBHOOK",
            MessageType::Ping => "PING",
            MessageType::Pong => "PONG",
        }
    }

    /// Match a wire discriminator exactly (the protocol is case-sensitive)
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "LOGIN" => Some(MessageType::Login),
            "SUCCESS" => Some(MessageType::Success),
            "FAILED" => Some(MessageType::Failed),
            "WEBHOOK" => Some(MessageType::Webhook),
            "PING" => Some(MessageType::Ping),
            "PONG" => Some(MessageType::Pong),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Correlation id carried by PING/PONG, echoed back exactly as received
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PingId(pub serde_json::Value);

impl PingId {
    pub fn missing() -> Self {
        Self(serde_json::Value::Null)
    }
}

impl fmt::Display for PingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            serde_json::Value::String(s) => f.write_str(s),
            other => write!(f, "{}", other),
        }
    }
}

/// Body of a relayed webhook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookBody {
    /// Delivered as `bufferText`
    Text(String),
    /// Delivered as base64 `buffer`
    Binary(Vec<u8>),
}

impl WebhookBody {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            WebhookBody::Text(text) => text.as_bytes(),
            WebhookBody::Binary(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// A webhook event relayed by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookPayload {
    pub headers: HeaderCollection,
    pub body: WebhookBody,
}

/// Messages received from the relay server
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Login accepted
    LoginSuccess,
    /// Login rejected
    LoginFailed,
    /// Webhook event to replay locally
    Webhook(WebhookPayload),
    /// Application-level ping, must be answered with a matching PONG
    Ping { id: PingId },
    /// Application-level pong
    Pong { id: PingId },
    /// A type this client does not understand
    Unknown { raw_type: String },
}

/// Messages sent from client to relay server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum OutboundMessage {
    /// Authenticate with the shared secret
    Login { password: String },
    /// Answer to a PING
    Pong {
        #[serde(rename = "pingId")]
        ping_id: PingId,
    },
}
