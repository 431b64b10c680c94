//! Presentation sinks

use audit_log::AuditSink;
use camera_capture::VideoFrame;
use perception::{SignalClass, StatusCode};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::{OutputConfig, OutputMode};

/// Where frames and status go for a human to see
pub trait OutputSink: Send + Sync {
    fn render_frame(&self, frame: &VideoFrame);
    fn report_status(&self, class: SignalClass, status: StatusCode);
    fn set_overall_status(&self, status: &str);
    fn append_log(&self, message: &str);
}

/// Select the sink once at startup
pub fn build_output(
    config: &OutputConfig,
    jpeg_quality: u8,
    audit: Arc<dyn AuditSink>,
) -> Arc<dyn OutputSink> {
    match config.mode {
        OutputMode::Headless => {
            info!("Output: headless");
            Arc::new(HeadlessOutput::new(audit))
        }
        OutputMode::Preview => {
            info!("Output: preview file {}", config.preview_path.display());
            Arc::new(PreviewOutput::new(
                config.preview_path.clone(),
                config.preview_interval(),
                jpeg_quality,
            ))
        }
    }
}

/// No display; everything becomes a tagged line in the text audit log
pub struct HeadlessOutput {
    audit: Arc<dyn AuditSink>,
}

impl HeadlessOutput {
    /// Sink writing tagged lines to `audit`
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self { audit }
    }

    fn write(&self, line: &str) {
        if let Err(e) = self.audit.log_line(line) {
            warn!("Headless output write failed: {}", e);
        }
    }
}

impl OutputSink for HeadlessOutput {
    fn render_frame(&self, _frame: &VideoFrame) {}

    fn report_status(&self, class: SignalClass, status: StatusCode) {
        self.write(&format!("[{}] {}", class.as_str().to_uppercase(), status));
    }

    fn set_overall_status(&self, status: &str) {
        self.write(&format!("[STATUS] {}", status));
    }

    fn append_log(&self, message: &str) {
        self.write(&format!("[LOG] {}", message));
    }
}

struct PreviewState {
    last_written: Option<Instant>,
}

/// Keeps a JPEG of the latest frame on disk for an external viewer
pub struct PreviewOutput {
    path: PathBuf,
    interval: Duration,
    jpeg_quality: u8,
    state: Mutex<PreviewState>,
}

impl PreviewOutput {
    /// Preview writer; at most one write per `interval`
    pub fn new(path: PathBuf, interval: Duration, jpeg_quality: u8) -> Self {
        Self {
            path,
            interval,
            jpeg_quality,
            state: Mutex::new(PreviewState { last_written: None }),
        }
    }

    fn write_preview(&self, frame: &VideoFrame) -> Result<(), String> {
        let jpeg = frame
            .encode_jpeg(self.jpeg_quality)
            .map_err(|e| e.to_string())?;
        // write then rename so a viewer never sees a partial file
        let tmp = self.path.with_extension("jpg.tmp");
        fs::write(&tmp, jpeg).map_err(|e| e.to_string())?;
        fs::rename(&tmp, &self.path).map_err(|e| e.to_string())
    }
}

impl OutputSink for PreviewOutput {
    fn render_frame(&self, frame: &VideoFrame) {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let due = state
            .last_written
            .map_or(true, |last| now.saturating_duration_since(last) >= self.interval);
        if !due {
            return;
        }
        state.last_written = Some(now);

        if let Err(e) = self.write_preview(frame) {
            warn!("Preview write failed: {}", e);
        } else {
            debug!("Preview updated (frame {})", frame.sequence);
        }
    }

    fn report_status(&self, class: SignalClass, status: StatusCode) {
        info!("[{}] {}", class.as_str(), status);
    }

    fn set_overall_status(&self, status: &str) {
        info!("Monitor status: {}", status);
    }

    fn append_log(&self, message: &str) {
        info!("{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryAudit;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn frame() -> VideoFrame {
        VideoFrame::new(RgbImage::from_pixel(64, 48, Rgb([90, 120, 150])), 0, 3)
    }

    #[test]
    fn test_headless_writes_tagged_lines() {
        let audit = Arc::new(MemoryAudit::default());
        let output = HeadlessOutput::new(audit.clone());

        output.render_frame(&frame());
        output.report_status(SignalClass::Face, StatusCode::FaceLeft);
        output.report_status(SignalClass::Motion, StatusCode::MotionDetected);
        output.set_overall_status("monitoring");
        output.append_log("camera opened");

        assert_eq!(
            audit.lines(),
            vec![
                "[FACE] FACE_LEFT",
                "[MOTION] MOTION_DETECTED",
                "[STATUS] monitoring",
                "[LOG] camera opened",
            ]
        );
    }

    #[test]
    fn test_preview_writes_jpeg_at_most_every_interval() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preview.jpg");
        let output = PreviewOutput::new(path.clone(), Duration::from_secs(60), 80);

        output.render_frame(&frame());
        let first = fs::read(&path).unwrap();
        assert_eq!(&first[..2], &[0xFF, 0xD8]);

        fs::remove_file(&path).unwrap();
        output.render_frame(&frame());
        assert!(!path.exists());
    }

    #[test]
    fn test_build_output_selects_mode() {
        let audit = Arc::new(MemoryAudit::default());
        let headless = build_output(&OutputConfig::default(), 70, audit.clone());
        headless.set_overall_status("ready");
        assert_eq!(audit.lines(), vec!["[STATUS] ready"]);

        let preview_config = OutputConfig {
            mode: OutputMode::Preview,
            ..Default::default()
        };
        let preview = build_output(&preview_config, 70, audit.clone());
        preview.set_overall_status("ready");
        assert_eq!(audit.lines().len(), 1);
    }
}
