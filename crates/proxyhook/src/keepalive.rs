//! Transport-level keepalive
//!
//! A websocket Ping control frame goes out on a fixed period so that both
//! ends see traffic well inside the idle timeout. This is unrelated to the
//! application PING/PONG messages.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::error::TransportError;

/// Period between liveness signals
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_millis(50_000);

/// Something that can emit a low-level liveness signal on a connection
#[async_trait]
pub trait LivenessSignal {
    async fn send_liveness_signal(&mut self) -> Result<(), TransportError>;
}

#[async_trait]
impl<S> LivenessSignal for SplitSink<WebSocketStream<S>, Message>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send_liveness_signal(&mut self) -> Result<(), TransportError> {
        let payload = unix_millis().to_be_bytes().to_vec();
        self.send(Message::Ping(payload)).await?;
        Ok(())
    }
}

/// Current time in milliseconds since the Unix epoch
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Periodic keepalive timer owned by one session
///
/// Once cancelled, [`tick`](Self::tick) never completes again.
pub struct KeepaliveTimer {
    interval: Option<Interval>,
}

impl KeepaliveTimer {
    /// Start a timer whose first tick is one full period from now
    pub fn start(period: Duration) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval: Some(interval),
        }
    }

    /// Wait for the next tick
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    pub fn cancel(&mut self) {
        self.interval = None;
    }

    pub fn is_active(&self) -> bool {
        self.interval.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_period() {
        let mut timer = KeepaliveTimer::start(KEEPALIVE_INTERVAL);
        let started = Instant::now();

        timer.tick().await;
        assert_eq!(started.elapsed(), KEEPALIVE_INTERVAL);

        timer.tick().await;
        assert_eq!(started.elapsed(), KEEPALIVE_INTERVAL * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let mut timer = KeepaliveTimer::start(Duration::from_millis(10));
        timer.cancel();
        assert!(!timer.is_active());

        let result = tokio::time::timeout(Duration::from_secs(3600), timer.tick()).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_unix_millis_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(unix_millis() > 1_577_836_800_000);
    }
}
