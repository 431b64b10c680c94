//! File-backed audit log

use chrono::Local;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{AuditConfig, AuditError, AuditSink, AuditSubject};

#[derive(Serialize)]
struct JournalEntry<'a> {
    timestamp: String,
    student: &'a str,
    exam: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    detail: &'a str,
    confidence: u8,
}

struct Journal {
    file: File,
    has_entries: bool,
    closed: bool,
}

/// Text log plus JSON journal in one directory
pub struct FileAuditLog {
    subject: AuditSubject,
    text_path: PathBuf,
    journal_path: PathBuf,
    text: Mutex<File>,
    journal: Mutex<Journal>,
}

impl FileAuditLog {
    /// Open (or create) both files.
    ///
    /// A journal left terminated by a previous run is reopened for appending;
    /// one left unterminated by a crash is appended to as is.
    pub fn open(config: &AuditConfig, subject: AuditSubject) -> Result<Self, AuditError> {
        fs::create_dir_all(&config.dir)?;

        let text_path = config.text_path();
        let journal_path = config.journal_path();

        let text = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&text_path)?;
        let has_entries = prepare_journal(&journal_path)?;
        let journal = OpenOptions::new().append(true).open(&journal_path)?;

        info!(
            "Audit log open: {} / {}",
            text_path.display(),
            journal_path.display()
        );

        Ok(Self {
            subject,
            text_path,
            journal_path,
            text: Mutex::new(text),
            journal: Mutex::new(Journal {
                file: journal,
                has_entries,
                closed: false,
            }),
        })
    }

    /// Who this log belongs to
    pub fn subject(&self) -> &AuditSubject {
        &self.subject
    }

    /// Plain-text log location
    pub fn text_path(&self) -> &Path {
        &self.text_path
    }

    /// JSON journal location
    pub fn journal_path(&self) -> &Path {
        &self.journal_path
    }
}

/// Make the journal an open array. Returns whether it already holds entries.
fn prepare_journal(path: &Path) -> Result<bool, AuditError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    if content.trim().is_empty() {
        fs::write(path, "[\n")?;
        return Ok(false);
    }

    let body = content.trim_end();
    let entries = body
        .trim_start()
        .strip_prefix('[')
        .ok_or_else(|| AuditError::Corrupt(path.to_path_buf()))?;

    match entries.strip_suffix(']') {
        Some(inner) => {
            debug!("Reopening terminated journal {}", path.display());
            let has_entries = !inner.trim().is_empty();
            let reopened = body.len() - 1;
            fs::write(path, body[..reopened].trim_end())?;
            Ok(has_entries)
        }
        None => {
            warn!(
                "Journal {} was not terminated by the previous run",
                path.display()
            );
            Ok(!entries.trim().is_empty())
        }
    }
}

impl AuditSink for FileAuditLog {
    fn log_line(&self, message: &str) -> Result<(), AuditError> {
        let line = format!(
            "[{}] [{}|{}|{}] {}\n",
            Local::now().format("%H:%M:%S"),
            self.subject.student,
            self.subject.exam,
            self.subject.session,
            message
        );

        let mut text = self
            .text
            .lock()
            .map_err(|e| AuditError::Lock(e.to_string()))?;
        text.write_all(line.as_bytes())?;
        Ok(())
    }

    fn log_event(&self, kind: &str, detail: &str, confidence: u8) -> Result<(), AuditError> {
        let entry = JournalEntry {
            timestamp: Local::now().format("%d-%m-%Y %H:%M:%S%.3f").to_string(),
            student: &self.subject.student,
            exam: &self.subject.exam,
            kind,
            detail,
            confidence,
        };
        let object =
            serde_json::to_string(&entry).map_err(|e| AuditError::Serialization(e.to_string()))?;

        let mut journal = self
            .journal
            .lock()
            .map_err(|e| AuditError::Lock(e.to_string()))?;
        if journal.closed {
            return Err(AuditError::Closed);
        }

        let separator = if journal.has_entries { ",\n" } else { "\n" };
        write!(journal.file, "{}  {}", separator, object)?;
        journal.has_entries = true;
        Ok(())
    }

    fn close(&self) -> Result<(), AuditError> {
        let mut journal = self
            .journal
            .lock()
            .map_err(|e| AuditError::Lock(e.to_string()))?;
        if journal.closed {
            return Ok(());
        }

        journal.file.write_all(b"\n]\n")?;
        journal.file.sync_all()?;
        journal.closed = true;
        info!("Audit journal closed: {}", self.journal_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> AuditConfig {
        AuditConfig {
            dir: dir.path().join("audit"),
            ..Default::default()
        }
    }

    fn subject() -> AuditSubject {
        AuditSubject {
            student: "s-101".into(),
            exam: "calc-2".into(),
            session: "room-3".into(),
        }
    }

    fn journal(config: &AuditConfig) -> Vec<Value> {
        let content = fs::read_to_string(config.journal_path()).unwrap();
        serde_json::from_str::<Vec<Value>>(&content).unwrap()
    }

    #[test]
    fn test_text_line_format() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let log = FileAuditLog::open(&config, subject()).unwrap();

        log.log_line("[s-101 | calc-2] Face: FACE_LEFT (SENT)").unwrap();

        let content = fs::read_to_string(config.text_path()).unwrap();
        let line = content.lines().next().unwrap();
        // "[HH:MM:SS] " prefix
        assert_eq!(&line[0..1], "[");
        assert_eq!(&line[9..11], "] ");
        assert!(line[11..].starts_with("[s-101|calc-2|room-3] [s-101 | calc-2] Face: FACE_LEFT (SENT)"));
    }

    #[test]
    fn test_journal_is_valid_array_after_close() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let log = FileAuditLog::open(&config, subject()).unwrap();

        log.log_event("face", "FACE_LEFT", 2).unwrap();
        log.log_event("motion", "MOTION_DETECTED", 2).unwrap();
        log.close().unwrap();

        let entries = journal(&config);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["type"], "face");
        assert_eq!(entries[0]["detail"], "FACE_LEFT");
        assert_eq!(entries[0]["student"], "s-101");
        assert_eq!(entries[0]["exam"], "calc-2");
        assert_eq!(entries[1]["confidence"], 2);

        let ts = entries[0]["timestamp"].as_str().unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(ts, "%d-%m-%Y %H:%M:%S%.3f").is_ok());
    }

    #[test]
    fn test_empty_journal_closes_to_empty_array() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let log = FileAuditLog::open(&config, subject()).unwrap();
        log.close().unwrap();
        assert!(journal(&config).is_empty());
    }

    #[test]
    fn test_close_is_written_once() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let log = FileAuditLog::open(&config, subject()).unwrap();

        log.log_event("face", "NO_FACE", 2).unwrap();
        log.close().unwrap();
        log.close().unwrap();

        let content = fs::read_to_string(config.journal_path()).unwrap();
        assert_eq!(content.matches(']').count(), 1);
        assert!(matches!(
            log.log_event("face", "FACE_UP", 2),
            Err(AuditError::Closed)
        ));
    }

    #[test]
    fn test_reopen_appends_to_previous_run() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);

        let first = FileAuditLog::open(&config, subject()).unwrap();
        first.log_event("face", "FACE_CENTER", 2).unwrap();
        first.close().unwrap();
        drop(first);

        let second = FileAuditLog::open(&config, subject()).unwrap();
        second.log_event("motion", "MOTION_DETECTED", 2).unwrap();
        second.close().unwrap();

        let entries = journal(&config);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1]["detail"], "MOTION_DETECTED");
    }

    #[test]
    fn test_reopen_after_crash_keeps_entries() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);

        let crashed = FileAuditLog::open(&config, subject()).unwrap();
        crashed.log_event("face", "FACE_DOWN", 2).unwrap();
        drop(crashed);

        let next = FileAuditLog::open(&config, subject()).unwrap();
        next.log_event("face", "FACE_CENTER", 2).unwrap();
        next.close().unwrap();

        assert_eq!(journal(&config).len(), 2);
    }

    #[test]
    fn test_non_array_journal_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        fs::create_dir_all(&config.dir).unwrap();
        fs::write(config.journal_path(), "{\"not\": \"an array\"}").unwrap();

        assert!(matches!(
            FileAuditLog::open(&config, subject()),
            Err(AuditError::Corrupt(_))
        ));
    }
}
