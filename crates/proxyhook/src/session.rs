//! One live tunnel connection
//!
//! A [`TunnelSession`] is built fresh for every connection attempt and
//! consumed by [`TunnelSession::run`], which resolves to the reason the
//! session ended.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use proxyhook_protocol::{encode_outbound, OutboundMessage, PingId, WebhookPayload, MAX_FRAME_SIZE};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::endpoint::TunnelEndpoint;
use crate::error::{FatalError, TransportError};
use crate::forwarder::WebhookForwarder;
use crate::keepalive::{KeepaliveTimer, LivenessSignal, KEEPALIVE_INTERVAL};
use crate::router::{Flow, MessageHandler, MessageRouter};

/// How long to wait for the connection to open
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Connection is torn down when nothing is read or written for this long
pub const IDLE_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    LoggingIn,
    Authenticated,
    Closed,
    Failed,
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalReason {
    CleanClose,
    TransportError,
    Fatal,
}

/// Termination signal of a session, with its cause
#[derive(Debug)]
pub enum Termination {
    CleanClose,
    TransportError(TransportError),
    Fatal(FatalError),
}

impl Termination {
    pub fn reason(&self) -> TerminalReason {
        match self {
            Termination::CleanClose => TerminalReason::CleanClose,
            Termination::TransportError(_) => TerminalReason::TransportError,
            Termination::Fatal(_) => TerminalReason::Fatal,
        }
    }
}

/// Timing knobs of a session
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub keepalive_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            idle_timeout: IDLE_TIMEOUT,
            keepalive_interval: KEEPALIVE_INTERVAL,
        }
    }
}

/// A single connection attempt to the relay
pub struct TunnelSession {
    endpoint: Arc<TunnelEndpoint>,
    forwarder: WebhookForwarder,
    password: String,
    options: SessionOptions,
}

impl TunnelSession {
    pub fn new(
        endpoint: Arc<TunnelEndpoint>,
        forwarder: WebhookForwarder,
        password: String,
        options: SessionOptions,
    ) -> Self {
        Self {
            endpoint,
            forwarder,
            password,
            options,
        }
    }

    /// Connect, log in and process messages until the session ends
    pub async fn run(self) -> Termination {
        tracing::debug!("Session state: {:?}", SessionState::Connecting);
        match connect(&self.endpoint, self.options.connect_timeout).await {
            Ok(ws) => self.run_on(ws).await,
            Err(e) => {
                tracing::debug!("Session state: {:?}", SessionState::Failed);
                Termination::TransportError(e)
            }
        }
    }

    /// Run the session over an already opened websocket
    pub async fn run_on<S>(self, ws: WebSocketStream<S>) -> Termination
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let (sink, mut stream) = ws.split();
        let idle_timeout = self.options.idle_timeout;

        let mut active = ActiveSession {
            sink,
            forwarder: self.forwarder,
            state: SessionState::LoggingIn,
            keepalive: KeepaliveTimer::start(self.options.keepalive_interval),
            last_activity: Instant::now(),
        };
        tracing::debug!("Session state: {:?}", active.state);

        tracing::info!("trying to log in");
        let login = OutboundMessage::Login {
            password: self.password,
        };
        if let Err(e) = active.send(&login).await {
            return active.terminate(Termination::TransportError(e)).await;
        }

        loop {
            let idle_deadline = active.last_activity + idle_timeout;

            tokio::select! {
                frame = stream.next() => {
                    let flow = match frame {
                        None => Flow::Stop(Termination::CleanClose),
                        Some(Err(tungstenite::Error::ConnectionClosed)) => {
                            Flow::Stop(Termination::CleanClose)
                        }
                        Some(Err(e)) => Flow::Stop(Termination::TransportError(e.into())),
                        Some(Ok(message)) => {
                            active.touch();
                            active.handle_frame(message).await
                        }
                    };
                    if let Flow::Stop(termination) = flow {
                        return active.terminate(termination).await;
                    }
                }
                _ = active.keepalive.tick() => {
                    if let Err(e) = active.sink.send_liveness_signal().await {
                        return active.terminate(Termination::TransportError(e)).await;
                    }
                    active.touch();
                }
                _ = tokio::time::sleep_until(idle_deadline) => {
                    let err = TransportError::Idle(idle_timeout);
                    return active.terminate(Termination::TransportError(err)).await;
                }
            }
        }
    }
}

/// Open the websocket, TLS iff the endpoint scheme is `wss`
async fn connect(
    endpoint: &TunnelEndpoint,
    timeout: Duration,
) -> Result<WebSocketStream<MaybeTlsStream<TcpStream>>, TransportError> {
    let config = WebSocketConfig {
        max_message_size: Some(MAX_FRAME_SIZE),
        max_frame_size: Some(MAX_FRAME_SIZE),
        ..WebSocketConfig::default()
    };

    tracing::debug!("Connecting to {} (tls: {})", endpoint, endpoint.use_tls());
    let connecting =
        tokio_tungstenite::connect_async_with_config(endpoint.connect_url(), Some(config), false);
    let (ws, _response) = tokio::time::timeout(timeout, connecting)
        .await
        .map_err(|_| TransportError::ConnectTimeout(endpoint.to_string()))??;

    Ok(ws)
}

/// State of a session whose transport is open
struct ActiveSession<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
    forwarder: WebhookForwarder,
    state: SessionState,
    keepalive: KeepaliveTimer,
    last_activity: Instant,
}

impl<S> ActiveSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn transition(&mut self, state: SessionState) {
        tracing::debug!("Session state: {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    async fn send(&mut self, message: &OutboundMessage) -> Result<(), TransportError> {
        let text = encode_outbound(message)?;
        self.sink.send(Message::Text(text)).await?;
        self.touch();
        Ok(())
    }

    async fn handle_frame(&mut self, message: Message) -> Flow {
        match message {
            Message::Text(text) => MessageRouter::dispatch(text.as_bytes(), self).await,
            Message::Binary(data) => MessageRouter::dispatch(&data, self).await,
            // Answered by the transport on the next write or read
            Message::Ping(_) => Flow::Continue,
            Message::Pong(data) => {
                tracing::debug!("Received liveness pong ({} bytes)", data.len());
                Flow::Continue
            }
            Message::Close(frame) => {
                tracing::debug!("Close frame received: {:?}", frame);
                Flow::Stop(Termination::CleanClose)
            }
            Message::Frame(_) => Flow::Continue,
        }
    }

    /// Cancel the keepalive, close the transport where needed and report
    async fn terminate(mut self, termination: Termination) -> Termination {
        self.keepalive.cancel();

        match &termination {
            Termination::CleanClose => {
                tracing::info!("websocket closed");
                let _ = self.sink.close().await;
                self.transition(SessionState::Closed);
            }
            Termination::TransportError(e) => {
                tracing::error!("websocket stream exception: {}", e);
                self.transition(SessionState::Failed);
            }
            Termination::Fatal(e) => {
                tracing::error!("{}", e);
                let _ = self.sink.close().await;
                self.transition(SessionState::Failed);
            }
        }

        termination
    }
}

#[async_trait]
impl<S> MessageHandler for ActiveSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn on_login_success(&mut self) -> Flow {
        tracing::info!("logged in");
        self.transition(SessionState::Authenticated);
        Flow::Continue
    }

    async fn on_login_failed(&mut self) -> Flow {
        Flow::Stop(Termination::Fatal(FatalError::LoginFailed))
    }

    async fn on_webhook(&mut self, payload: WebhookPayload) -> Flow {
        if self.state != SessionState::Authenticated {
            tracing::debug!("Webhook received before login was acknowledged");
        }
        self.forwarder.forward(&payload);
        Flow::Continue
    }

    async fn on_ping(&mut self, id: PingId) -> Flow {
        tracing::debug!("received PING with id {}", id);
        match self.send(&OutboundMessage::Pong { ping_id: id }).await {
            Ok(()) => Flow::Continue,
            Err(e) => Flow::Stop(Termination::TransportError(e)),
        }
    }

    async fn on_pong(&mut self, id: PingId) -> Flow {
        tracing::debug!("received PONG with id {}", id);
        Flow::Continue
    }

    async fn on_unknown(&mut self, raw_type: String) -> Flow {
        Flow::Stop(Termination::Fatal(FatalError::UnknownMessageType(raw_type)))
    }
}
