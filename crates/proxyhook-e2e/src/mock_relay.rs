//! In-process relay server speaking the tunnel protocol
//!
//! Each accepted websocket is handed to the test as a [`RelayConnection`],
//! which drives the relay side of the conversation explicitly.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// Upper bound for any single wait on the client
const RECV_TIMEOUT: Duration = Duration::from_secs(10);

pub struct MockRelay {
    addr: SocketAddr,
    incoming: mpsc::UnboundedReceiver<RelayConnection>,
}

impl MockRelay {
    /// Start accepting websocket connections on an ephemeral port
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock relay");
        let addr = listener.local_addr().unwrap();
        let (tx, incoming) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                let (stream, peer) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };
                let accepted_at = Instant::now();
                let tx = tx.clone();

                tokio::spawn(async move {
                    match handshake(stream).await {
                        Ok((path, ws)) => {
                            tracing::debug!("Relay accepted {} on {}", peer, path);
                            let _ = tx.send(RelayConnection {
                                accepted_at,
                                path,
                                ws,
                            });
                        }
                        Err(e) => tracing::debug!("Relay handshake with {} failed: {}", peer, e),
                    }
                });
            }
        });

        Self { addr, incoming }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Tunnel URL the client should be pointed at
    pub fn url(&self) -> String {
        format!("ws://{}/listen", self.addr)
    }

    /// Wait for the next client connection
    pub async fn accept(&mut self) -> anyhow::Result<RelayConnection> {
        self.accept_within(RECV_TIMEOUT)
            .await
            .ok_or_else(|| anyhow!("no client connected within {:?}", RECV_TIMEOUT))
    }

    /// Next client connection, or `None` if none arrives in `timeout`
    pub async fn accept_within(&mut self, timeout: Duration) -> Option<RelayConnection> {
        tokio::time::timeout(timeout, self.incoming.recv())
            .await
            .ok()
            .flatten()
    }
}

async fn handshake(stream: TcpStream) -> anyhow::Result<(String, WebSocketStream<TcpStream>)> {
    let mut path = String::new();
    let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        path = req.uri().to_string();
        Ok(resp)
    };
    let ws = tokio_tungstenite::accept_hdr_async(stream, callback).await?;
    Ok((path, ws))
}

/// The relay end of one client websocket
pub struct RelayConnection {
    pub accepted_at: Instant,
    /// Request target of the upgrade, e.g. `/listen`
    pub path: String,
    ws: WebSocketStream<TcpStream>,
}

impl RelayConnection {
    /// Next text or binary frame parsed as JSON; control frames are skipped
    pub async fn recv_json(&mut self) -> anyhow::Result<Value> {
        self.try_recv_json(RECV_TIMEOUT)
            .await?
            .ok_or_else(|| anyhow!("no message within {:?}", RECV_TIMEOUT))
    }

    /// Like [`recv_json`](Self::recv_json), but `Ok(None)` when nothing arrives in time
    pub async fn try_recv_json(&mut self, timeout: Duration) -> anyhow::Result<Option<Value>> {
        let deadline = Instant::now() + timeout;
        loop {
            let next = match tokio::time::timeout_at(deadline, self.ws.next()).await {
                Ok(next) => next,
                Err(_) => return Ok(None),
            };
            match next {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(&text)
                        .map(Some)
                        .with_context(|| format!("client sent invalid JSON: {}", text));
                }
                Some(Ok(Message::Binary(data))) => {
                    return serde_json::from_slice(&data)
                        .map(Some)
                        .context("client sent invalid JSON");
                }
                Some(Ok(Message::Close(_))) | None => bail!("client closed the connection"),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Wait for the client to go away; `true` if it did within `timeout`
    pub async fn wait_closed(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, self.ws.next()).await {
                Err(_) => return false,
                Ok(None) | Ok(Some(Err(_))) | Ok(Some(Ok(Message::Close(_)))) => return true,
                Ok(Some(Ok(_))) => continue,
            }
        }
    }

    pub async fn send_json(&mut self, value: Value) -> anyhow::Result<()> {
        self.ws.send(Message::Text(value.to_string())).await?;
        Ok(())
    }

    /// Expect a LOGIN as the first message and accept it.
    ///
    /// Returns the password the client presented.
    pub async fn login(&mut self) -> anyhow::Result<String> {
        let login = self.recv_json().await?;
        if login["type"] != "LOGIN" {
            bail!("expected LOGIN first, got {}", login);
        }
        let password = login["password"]
            .as_str()
            .ok_or_else(|| anyhow!("LOGIN without a string password: {}", login))?
            .to_string();
        self.send_json(serde_json::json!({"type": "SUCCESS"})).await?;
        Ok(password)
    }

    /// Close with a websocket close handshake
    pub async fn close(mut self) -> anyhow::Result<()> {
        self.ws.close(None).await?;
        // Drain until the client acknowledges
        let _ = tokio::time::timeout(RECV_TIMEOUT, async {
            while let Some(Ok(_)) = self.ws.next().await {}
        })
        .await;
        Ok(())
    }

    /// Drop the TCP connection without a close handshake
    pub fn drop_abruptly(self) {
        drop(self.ws);
    }
}
