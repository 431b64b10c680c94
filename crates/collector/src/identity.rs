//! Session identity bootstrap

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::CollectorError;

/// Who is being monitored. Fetched once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub student: String,
    pub exam: String,
    pub session: String,
}

impl IdentityContext {
    /// Context without a numeric session id
    pub fn new(
        student: impl Into<String>,
        exam: impl Into<String>,
        session: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            student: student.into(),
            exam: exam.into(),
            session: session.into(),
        }
    }

    /// Parse the active-session response body
    pub fn parse(body: &str) -> Result<Self, CollectorError> {
        if body.trim().is_empty() {
            return Err(CollectorError::Bootstrap(
                "active session response was empty".to_string(),
            ));
        }
        serde_json::from_str(body).map_err(|e| CollectorError::Bootstrap(e.to_string()))
    }
}

/// GET the active session. Anything but a 200 with a parseable body is an error.
pub async fn fetch_identity(
    client: &reqwest::Client,
    url: &str,
) -> Result<IdentityContext, CollectorError> {
    info!("Fetching active session from {}", url);

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| CollectorError::Bootstrap(e.to_string()))?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(CollectorError::Bootstrap(format!(
            "server answered {} for active session",
            status.as_u16()
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|e| CollectorError::Bootstrap(e.to_string()))?;

    let identity = IdentityContext::parse(&body)?;
    info!(
        "Active session {} (student {}, exam {})",
        identity.session, identity.student, identity.exam
    );
    Ok(identity)
}
