use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::read_password;
use crate::endpoint::TunnelEndpoint;
use crate::error::FatalError;
use crate::forwarder::WebhookForwarder;
use crate::session::{SessionOptions, TerminalReason, Termination, TunnelSession};

/// Wait before reconnecting after the relay closed the connection
pub const CLEAN_CLOSE_DELAY: Duration = Duration::from_millis(300);

/// Wait before reconnecting after a transport failure
pub const TRANSPORT_ERROR_DELAY: Duration = Duration::from_millis(2000);

/// Fixed reconnect delays; they do not grow with repeated failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub clean_close_delay: Duration,
    pub transport_error_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            clean_close_delay: CLEAN_CLOSE_DELAY,
            transport_error_delay: TRANSPORT_ERROR_DELAY,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the next attempt, or `None` when no reconnect may happen
    pub fn delay_after(&self, reason: TerminalReason) -> Option<Duration> {
        match reason {
            TerminalReason::CleanClose => Some(self.clean_close_delay),
            TerminalReason::TransportError => Some(self.transport_error_delay),
            TerminalReason::Fatal => None,
        }
    }
}

/// Keeps the tunnel established, one fresh [`TunnelSession`] per attempt
pub struct ConnectionSupervisor {
    endpoint: Arc<TunnelEndpoint>,
    forwarder: WebhookForwarder,
    password_env: String,
    policy: ReconnectPolicy,
    options: SessionOptions,
}

impl ConnectionSupervisor {
    pub fn new(
        endpoint: Arc<TunnelEndpoint>,
        forwarder: WebhookForwarder,
        password_env: impl Into<String>,
    ) -> Self {
        Self {
            endpoint,
            forwarder,
            password_env: password_env.into(),
            policy: ReconnectPolicy::default(),
            options: SessionOptions::default(),
        }
    }

    pub fn with_session_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    fn new_session(&self) -> TunnelSession {
        TunnelSession::new(
            self.endpoint.clone(),
            self.forwarder.clone(),
            read_password(&self.password_env),
            self.options,
        )
    }

    /// Reconnect forever; returns only when a session ends fatally
    pub async fn run(&self) -> Result<(), FatalError> {
        tracing::info!(
            "starting client for websocket: {} posting to webhook URLs: {:?}",
            self.endpoint,
            self.forwarder
                .targets()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
        );

        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            tracing::debug!("Connection attempt {} to {}", attempt, self.endpoint);

            let termination = self.new_session().run().await;
            let reason = termination.reason();

            match termination {
                Termination::Fatal(e) => return Err(e),
                Termination::CleanClose => {}
                Termination::TransportError(e) => {
                    tracing::warn!("Tunnel connection lost: {}", e);
                }
            }

            if let Some(delay) = self.policy.delay_after(reason) {
                tracing::info!("Reconnecting in {}ms", delay.as_millis());
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// Like [`run`](Self::run), but also stops cleanly when `shutdown` completes
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), FatalError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = self.run() => result,
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
        }
    }
}
