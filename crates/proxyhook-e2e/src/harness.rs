//! Runs the real client in the background of a test

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use proxyhook::{
    ConnectionSupervisor, FatalError, SessionOptions, TunnelEndpoint, WebhookForwarder,
    WebhookTarget,
};

/// A spawned [`ConnectionSupervisor`]; aborted when dropped
pub struct ClientHandle {
    task: Option<JoinHandle<Result<(), FatalError>>>,
}

impl ClientHandle {
    /// Start a client tunnelling `relay_url` to `targets`.
    ///
    /// The password is read from `password_env` on every attempt, so tests
    /// should pick a variable name no other test uses.
    pub fn spawn(relay_url: &str, targets: &[String], password_env: &str) -> anyhow::Result<Self> {
        Self::spawn_with_options(relay_url, targets, password_env, SessionOptions::default())
    }

    pub fn spawn_with_options(
        relay_url: &str,
        targets: &[String],
        password_env: &str,
        options: SessionOptions,
    ) -> anyhow::Result<Self> {
        let endpoint = TunnelEndpoint::parse(relay_url)?;
        let targets = targets
            .iter()
            .map(|t| WebhookTarget::parse(t))
            .collect::<Result<Vec<_>, _>>()?;
        let forwarder = WebhookForwarder::new(targets.into())?;

        let supervisor = ConnectionSupervisor::new(Arc::new(endpoint), forwarder, password_env)
            .with_session_options(options);

        let task = tokio::spawn(async move { supervisor.run().await });
        Ok(Self { task: Some(task) })
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Wait for the supervisor to return; `None` if it is still running after `timeout`
    pub async fn join_within(&mut self, timeout: Duration) -> Option<Result<(), FatalError>> {
        let task = self.task.as_mut()?;
        match tokio::time::timeout(timeout, task).await {
            Ok(joined) => {
                self.task = None;
                Some(joined.expect("client task panicked"))
            }
            Err(_) => None,
        }
    }
}

impl Drop for ClientHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
