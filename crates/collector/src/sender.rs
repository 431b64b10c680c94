//! HTTP delivery

use reqwest::header::CONTENT_TYPE;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::{CollectorConfig, CollectorError, Payload};

/// One delivery attempt for one payload
pub trait Deliver: Send + Sync + 'static {
    fn deliver(
        &self,
        payload: &Payload,
    ) -> impl Future<Output = Result<(), CollectorError>> + Send;
}

/// POSTs JSON payloads to the collector event endpoint
#[derive(Debug, Clone)]
pub struct HttpSender {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpSender {
    /// Sender posting to the configured event endpoint
    pub fn new(client: reqwest::Client, config: &CollectorConfig) -> Self {
        Self {
            client,
            url: config.event_url(),
            timeout: config.request_timeout(),
        }
    }

    /// Endpoint every payload is posted to
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Deliver for HttpSender {
    async fn deliver(&self, payload: &Payload) -> Result<(), CollectorError> {
        let body = payload.to_json()?;

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CollectorError::Timeout(self.timeout.as_millis() as u64)
                } else {
                    CollectorError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollectorError::Status(status.as_u16()));
        }

        debug!("Delivered {} (HTTP {})", payload.describe(), status.as_u16());
        Ok(())
    }
}
