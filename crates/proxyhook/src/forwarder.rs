use std::sync::Arc;

use bytes::Bytes;
use proxyhook_protocol::{HeaderCollection, WebhookPayload};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;

use crate::endpoint::WebhookTarget;
use crate::policy::{HeaderPolicy, EVENT_ID_HEADERS};

/// Replays relayed webhooks as POST requests to every configured target
#[derive(Clone)]
pub struct WebhookForwarder {
    client: reqwest::Client,
    targets: Arc<[WebhookTarget]>,
    policy: HeaderPolicy,
}

impl WebhookForwarder {
    pub fn new(targets: Arc<[WebhookTarget]>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .build()?;
        Ok(Self {
            client,
            targets,
            policy: HeaderPolicy,
        })
    }

    pub fn targets(&self) -> &[WebhookTarget] {
        &self.targets
    }

    /// Start one delivery per target and return immediately
    ///
    /// Deliveries run concurrently on the current runtime. A failing target
    /// does not affect the others. Nothing is retried; outcomes are only logged.
    pub fn forward(&self, payload: &WebhookPayload) {
        tracing::info!("Webhook received");
        log_event_ids(&payload.headers);

        let headers = self.filtered_headers(&payload.headers);
        let body = Bytes::copy_from_slice(payload.body.as_bytes());

        for target in self.targets.iter().cloned() {
            let client = self.client.clone();
            let headers = headers.clone();
            let body = body.clone();
            tokio::spawn(async move {
                let _ = deliver(&client, &target, headers, body).await;
            });
        }
    }

    /// Build the outbound header map from the allowlisted relayed headers
    fn filtered_headers(&self, headers: &HeaderCollection) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, values) in self.policy.filter(headers) {
            let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
                tracing::warn!("Skipping invalid header name: {}", name);
                continue;
            };
            for value in values {
                match HeaderValue::from_str(value) {
                    Ok(header_value) => {
                        map.append(header_name.clone(), header_value);
                    }
                    Err(_) => tracing::warn!("Skipping invalid value for header {}", name),
                }
            }
        }
        map
    }
}

fn log_event_ids(headers: &HeaderCollection) {
    for name in EVENT_ID_HEADERS {
        if let Some(values) = headers.get_all(name) {
            tracing::info!("Webhook header {}: {:?}", name, values);
        }
    }
}

async fn deliver(
    client: &reqwest::Client,
    target: &WebhookTarget,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, reqwest::Error> {
    let result = client
        .post(target.url().clone())
        .headers(headers)
        .body(body)
        .send()
        .await;

    match result {
        Ok(response) => {
            let status = response.status();
            tracing::info!("Webhook POSTed to URL: {}", target);
            if status.is_success() {
                tracing::info!("Webhook POST response status: {}", status);
            } else {
                tracing::warn!("Webhook POST to {} returned non-success: {}", target, status);
            }
            tracing::debug!("Webhook POST response headers: {:?}", response.headers());
            Ok(status)
        }
        Err(e) => {
            tracing::warn!("Webhook POST to {} failed: {}", target, e);
            Err(e)
        }
    }
}
