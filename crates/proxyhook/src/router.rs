//! Decode inbound frames and dispatch them by message type

use async_trait::async_trait;
use proxyhook_protocol::{decode_inbound, InboundMessage, PingId, WebhookPayload};

use crate::session::Termination;

/// What the session should do after handling a message
#[derive(Debug)]
pub enum Flow {
    Continue,
    Stop(Termination),
}

/// Per-type handlers invoked by [`MessageRouter::dispatch`]
#[async_trait]
pub trait MessageHandler: Send {
    async fn on_login_success(&mut self) -> Flow;

    async fn on_login_failed(&mut self) -> Flow;

    async fn on_webhook(&mut self, payload: WebhookPayload) -> Flow;

    async fn on_ping(&mut self, id: PingId) -> Flow;

    async fn on_pong(&mut self, id: PingId) -> Flow;

    /// Called for unrecognised types and for frames whose type cannot be read
    async fn on_unknown(&mut self, raw_type: String) -> Flow;
}

pub struct MessageRouter;

impl MessageRouter {
    /// Decode one frame and invoke the matching handler
    pub async fn dispatch<H: MessageHandler>(frame: &[u8], handler: &mut H) -> Flow {
        let message = match decode_inbound(frame) {
            Ok(message) => message,
            Err(e) if e.is_undiscriminated() => {
                tracing::warn!("Undecodable message: {}", e);
                return handler.on_unknown(describe_raw_type(frame)).await;
            }
            Err(e) => {
                tracing::warn!("Dropping malformed message: {}", e);
                return Flow::Continue;
            }
        };

        tracing::debug!("payload: {:?}", message);

        match message {
            InboundMessage::LoginSuccess => handler.on_login_success().await,
            InboundMessage::LoginFailed => handler.on_login_failed().await,
            InboundMessage::Webhook(payload) => handler.on_webhook(payload).await,
            InboundMessage::Ping { id } => handler.on_ping(id).await,
            InboundMessage::Pong { id } => handler.on_pong(id).await,
            InboundMessage::Unknown { raw_type } => handler.on_unknown(raw_type).await,
        }
    }
}

/// Best-effort rendering of a frame's `type` for error reporting
fn describe_raw_type(frame: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(frame)
        .ok()
        .and_then(|v| v.get("type").map(|t| t.to_string()))
        .unwrap_or_else(|| "<missing>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    #[async_trait]
    impl MessageHandler for Recorder {
        async fn on_login_success(&mut self) -> Flow {
            self.calls.push("success".into());
            Flow::Continue
        }

        async fn on_login_failed(&mut self) -> Flow {
            self.calls.push("failed".into());
            Flow::Continue
        }

        async fn on_webhook(&mut self, payload: WebhookPayload) -> Flow {
            self.calls
                .push(format!("webhook:{}", String::from_utf8_lossy(payload.body.as_bytes())));
            Flow::Continue
        }

        async fn on_ping(&mut self, id: PingId) -> Flow {
            self.calls.push(format!("ping:{}", id));
            Flow::Continue
        }

        async fn on_pong(&mut self, id: PingId) -> Flow {
            self.calls.push(format!("pong:{}", id));
            Flow::Continue
        }

        async fn on_unknown(&mut self, raw_type: String) -> Flow {
            self.calls.push(format!("unknown:{}", raw_type));
            Flow::Continue
        }
    }

    async fn route(recorder: &mut Recorder, value: serde_json::Value) {
        MessageRouter::dispatch(value.to_string().as_bytes(), recorder).await;
    }

    #[tokio::test]
    async fn test_dispatch_by_type() {
        let mut recorder = Recorder::default();
        route(&mut recorder, json!({"type": "SUCCESS"})).await;
        route(&mut recorder, json!({"type": "WEBHOOK", "bufferText": "hi"})).await;
        route(&mut recorder, json!({"type": "PING", "pingId": "42"})).await;
        route(&mut recorder, json!({"type": "PONG", "pingId": "43"})).await;
        route(&mut recorder, json!({"type": "FAILED"})).await;
        route(&mut recorder, json!({"type": "FROBNICATE"})).await;

        assert_eq!(
            recorder.calls,
            vec![
                "success",
                "webhook:hi",
                "ping:42",
                "pong:43",
                "failed",
                "unknown:FROBNICATE"
            ]
        );
    }

    #[tokio::test]
    async fn test_undecodable_frames_route_to_unknown() {
        let mut recorder = Recorder::default();
        MessageRouter::dispatch(b"{not json", &mut recorder).await;
        route(&mut recorder, json!({"pingId": "1"})).await;
        route(&mut recorder, json!({"type": 5})).await;

        assert_eq!(
            recorder.calls,
            vec!["unknown:<missing>", "unknown:<missing>", "unknown:5"]
        );
    }

    #[tokio::test]
    async fn test_malformed_webhook_is_dropped() {
        let mut recorder = Recorder::default();
        let flow = MessageRouter::dispatch(
            json!({"type": "WEBHOOK", "buffer": "%%%"}).to_string().as_bytes(),
            &mut recorder,
        )
        .await;

        assert!(matches!(flow, Flow::Continue));
        assert!(recorder.calls.is_empty());
    }
}
