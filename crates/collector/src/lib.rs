//! Collector Delivery Module
//!
//! Outbound path from the capture loop to the remote collector:
//! - Identity bootstrap (who is being monitored)
//! - Fire-and-forget, ordered event dispatch on a single worker
//! - Latest-frame snapshot slot flushed on a fixed interval
//! - One delivery attempt per payload; failures are logged and dropped

pub mod dispatcher;
pub mod identity;
pub mod payload;
pub mod sender;
pub mod snapshot;

pub use dispatcher::{DispatchStats, DispatchWorker, EventDispatcher};
pub use identity::{fetch_identity, IdentityContext};
pub use payload::{OutboundEvent, Payload, Snapshot};
pub use sender::{Deliver, HttpSender};
pub use snapshot::{FrameSlot, SnapshotPublisher};

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Collector error types
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Collector answered with status {0}")]
    Status(u16),

    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Session bootstrap failed: {0}")]
    Bootstrap(String),

    #[error("Dispatcher closed")]
    Closed,
}

/// Collector endpoint configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Collector base URL
    pub base_url: String,
    /// Path receiving event and frame payloads
    pub event_path: String,
    /// Path returning the active session identity
    pub session_path: String,
    /// TCP connect timeout (seconds)
    pub connect_timeout_secs: u64,
    /// Whole-request timeout (seconds)
    pub request_timeout_secs: u64,
    /// Snapshot flush interval (milliseconds)
    pub flush_interval_ms: u64,
    /// How long shutdown waits for queued payloads (milliseconds)
    pub shutdown_grace_ms: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            event_path: "/api/event".to_string(),
            session_path: "/api/session/active".to_string(),
            connect_timeout_secs: 5,
            request_timeout_secs: 10,
            flush_interval_ms: 2000,
            shutdown_grace_ms: 3000,
        }
    }
}

impl CollectorConfig {
    /// Full URL of the event endpoint
    pub fn event_url(&self) -> String {
        join_url(&self.base_url, &self.event_path)
    }

    /// Full URL of the active-session endpoint
    pub fn session_url(&self) -> String {
        join_url(&self.base_url, &self.session_path)
    }

    /// Per-request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Time between snapshot flushes
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// How long shutdown waits for the dispatch queue
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Build the shared HTTP client
    pub fn http_client(&self) -> Result<reqwest::Client, CollectorError> {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .timeout(self.request_timeout())
            .build()
            .map_err(|e| CollectorError::Http(e.to_string()))
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
