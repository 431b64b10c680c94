//! Camera Capture Library for Vision Monitoring
//!
//! Provides the frame acquisition contract used by the capture loop.
//! Supports:
//! - Any device behind the [`FrameSource`] trait
//! - Still-image sequences replayed at capture cadence
//! - Canonical resize, grayscale conversion and JPEG snapshot encoding

pub mod frame;
pub mod source;

pub use frame::VideoFrame;
pub use source::ImageSequenceSource;

use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    Open(String),

    #[error("Frame read failed: {0}")]
    Read(String),

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Camera closed")]
    Closed,
}

impl CameraError {
    /// Whether the device is gone for good (as opposed to a single bad frame)
    pub fn is_fatal(&self) -> bool {
        matches!(self, CameraError::Open(_) | CameraError::Closed)
    }
}

/// Source of raw frames at a roughly fixed rate.
///
/// Implementations may block inside `read_frame` for up to one frame period.
pub trait FrameSource: Send {
    /// Read the next frame from the device
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError>;

    /// Human-readable device description for logs
    fn describe(&self) -> String;
}

/// Capture configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Directory of still images replayed as the video feed
    pub source_dir: PathBuf,
    /// Canonical frame width after resize
    pub width: u32,
    /// Canonical frame height after resize
    pub height: u32,
    /// Target FPS
    pub fps: u32,
    /// Restart from the first image after the last one
    pub loop_playback: bool,
    /// JPEG quality for snapshots (1-100)
    pub jpeg_quality: u8,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("frames"),
            width: 640,
            height: 480,
            fps: 30,
            loop_playback: true,
            jpeg_quality: 70,
        }
    }
}

impl CaptureConfig {
    /// Time budget for one capture tick
    pub fn frame_budget(&self) -> std::time::Duration {
        std::time::Duration::from_millis(1000 / self.fps.max(1) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_budget() {
        let config = CaptureConfig::default();
        assert_eq!(config.frame_budget().as_millis(), 33);

        let zero = CaptureConfig { fps: 0, ..Default::default() };
        assert_eq!(zero.frame_budget().as_millis(), 1000);
    }

    #[test]
    fn test_fatal_errors() {
        assert!(CameraError::Closed.is_fatal());
        assert!(CameraError::Open("no device".into()).is_fatal());
        assert!(!CameraError::Read("bad frame".into()).is_fatal());
    }
}
