//! Wire payloads for the collector endpoint

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use perception::StatusCode;
use serde::Serialize;
use std::sync::Arc;

use crate::{CollectorError, IdentityContext};

pub const EVENT_TYPE: &str = "vision";
pub const FRAME_TYPE: &str = "vision_frame";

/// Status change as posted to the collector
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundEvent {
    #[serde(rename = "type")]
    pub event_type: &'static str,
    pub action: StatusCode,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub student: String,
    pub exam: String,
    pub session: String,
}

impl OutboundEvent {
    /// Stamp with the current wall-clock time
    pub fn new(action: StatusCode, identity: &IdentityContext) -> Self {
        Self::at(action, identity, chrono::Utc::now().timestamp_millis())
    }

    /// Event with an explicit epoch-millisecond timestamp
    pub fn at(action: StatusCode, identity: &IdentityContext, timestamp_ms: i64) -> Self {
        Self {
            event_type: EVENT_TYPE,
            action,
            timestamp: timestamp_ms,
            student: identity.student.clone(),
            exam: identity.exam.clone(),
            session: identity.session.clone(),
        }
    }
}

/// Most recent encoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub jpeg: Vec<u8>,
    /// Epoch milliseconds
    pub captured_at_ms: i64,
    pub sequence: u32,
}

#[derive(Serialize)]
struct FrameMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    student: &'a str,
    exam: &'a str,
    session: &'a str,
    timestamp: i64,
    image: String,
}

/// Anything the dispatcher can deliver
#[derive(Debug, Clone)]
pub enum Payload {
    Event(OutboundEvent),
    Frame {
        snapshot: Snapshot,
        identity: Arc<IdentityContext>,
    },
}

impl Payload {
    /// Serialize to the collector's JSON body
    pub fn to_json(&self) -> Result<Vec<u8>, CollectorError> {
        let encoded = match self {
            Payload::Event(event) => serde_json::to_vec(event),
            Payload::Frame { snapshot, identity } => serde_json::to_vec(&FrameMessage {
                kind: FRAME_TYPE,
                student: &identity.student,
                exam: &identity.exam,
                session: &identity.session,
                timestamp: snapshot.captured_at_ms,
                image: STANDARD.encode(&snapshot.jpeg),
            }),
        };
        encoded.map_err(|e| CollectorError::Serialization(e.to_string()))
    }

    /// Short label for logs
    pub fn describe(&self) -> String {
        match self {
            Payload::Event(event) => format!("event {}", event.action),
            Payload::Frame { snapshot, .. } => format!(
                "frame #{} ({} bytes)",
                snapshot.sequence,
                snapshot.jpeg.len()
            ),
        }
    }
}
