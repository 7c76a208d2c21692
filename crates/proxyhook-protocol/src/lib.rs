//! Wire protocol spoken between the proxyhook client and its relay server
//!
//! Every frame is a JSON object discriminated by its `type` field.

mod codec;
mod error;
mod headers;
mod messages;

pub use codec::{decode_inbound, encode_outbound, keys, MAX_FRAME_SIZE};
pub use error::DecodeError;
pub use headers::HeaderCollection;
pub use messages::{
    InboundMessage, MessageType, OutboundMessage, PingId, WebhookBody, WebhookPayload,
};
