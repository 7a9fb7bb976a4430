use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::{AlertChannel, ReadingSink, SinkError};
use crate::domain::{Alert, Reading};

/// POSTs each record as JSON. Transient failures (5xx, timeouts, connection errors) are
/// retried with bounded exponential backoff before surfacing.
#[derive(Clone)]
pub struct WebhookSink {
    client: ClientWithMiddleware,
    url: String,
}

impl WebhookSink {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, SinkError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("reefer-fleet-sim/0.1")
            .build()
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;

        let policy = ExponentialBackoff::builder()
            .retry_bounds(Duration::from_millis(100), Duration::from_secs(2))
            .build_with_max_retries(max_retries);

        Ok(Self {
            client: ClientBuilder::new(http)
                .with(RetryTransientMiddleware::new_with_policy(policy))
                .build(),
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post<T: Serialize + Sync>(&self, record: &T) -> Result<(), SinkError> {
        let body = serde_json::to_vec(record).map_err(|e| SinkError::Encode(e.to_string()))?;

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(url = %self.url, %status, "webhook accepted record");
            Ok(())
        } else if status.is_client_error() {
            Err(SinkError::Rejected(format!("HTTP {status}")))
        } else {
            Err(SinkError::Unavailable(format!("HTTP {status}")))
        }
    }
}

#[async_trait]
impl ReadingSink for WebhookSink {
    async fn emit(&self, reading: &Reading) -> Result<(), SinkError> {
        self.post(reading).await
    }
}

#[async_trait]
impl AlertChannel for WebhookSink {
    async fn dispatch(&self, alert: &Alert) -> Result<(), SinkError> {
        self.post(alert).await
    }
}
