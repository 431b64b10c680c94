//! Audit Log
//!
//! Durable local record of what the monitor saw and reported:
//! - Line-oriented text log
//! - JSON journal (a top-level array of event objects)
//!
//! Neither depends on collector delivery succeeding.

mod file;

pub use file::FileAuditLog;

use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Audit log errors
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Journal is not a JSON array: {}", .0.display())]
    Corrupt(PathBuf),
    #[error("Journal already closed")]
    Closed,
    #[error("Lock error: {0}")]
    Lock(String),
}

/// Audit log configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Directory holding both files; created if missing
    pub dir: PathBuf,
    pub text_file: String,
    pub journal_file: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            text_file: "argusvision.log".to_string(),
            journal_file: "argusvision_events.json".to_string(),
        }
    }
}

impl AuditConfig {
    /// Text log path under `dir`
    pub fn text_path(&self) -> PathBuf {
        self.dir.join(&self.text_file)
    }

    /// Journal path under `dir`
    pub fn journal_path(&self) -> PathBuf {
        self.dir.join(&self.journal_file)
    }
}

/// Identifiers stamped on every record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditSubject {
    pub student: String,
    pub exam: String,
    pub session: String,
}

/// Append-only audit destination
pub trait AuditSink: Send + Sync {
    /// Append one line to the text log
    fn log_line(&self, message: &str) -> Result<(), AuditError>;

    /// Append one entry to the journal
    fn log_event(&self, kind: &str, detail: &str, confidence: u8) -> Result<(), AuditError>;

    /// Terminate the journal. Calls after the first are no-ops.
    fn close(&self) -> Result<(), AuditError>;
}
