//! Face bounding box to position zone

use crate::analysis::StatusCode;
use crate::config::FaceConfig;
use crate::detector::Rect;

/// Maps a face box and frame geometry to one of the six face statuses.
///
/// Horizontal checks take priority over vertical ones; the result is a pure
/// function of the inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneClassifier {
    pub min_area: u64,
    pub horizontal_threshold: f32,
    pub vertical_threshold: f32,
}

impl Default for ZoneClassifier {
    fn default() -> Self {
        Self::from_config(&FaceConfig::default())
    }
}

impl ZoneClassifier {
    /// Thresholds taken from the face config
    pub fn from_config(config: &FaceConfig) -> Self {
        Self {
            min_area: config.min_area,
            horizontal_threshold: config.horizontal_threshold,
            vertical_threshold: config.vertical_threshold,
        }
    }

    /// Zone of `bbox` within the frame. A missing or undersized box is NO_FACE.
    pub fn classify(&self, bbox: Option<&Rect>, frame_width: u32, frame_height: u32) -> StatusCode {
        let bbox = match bbox {
            Some(b) if b.area() >= self.min_area => b,
            _ => return StatusCode::NoFace,
        };

        let (cx, cy) = bbox.center();
        let width = frame_width as f32;
        let height = frame_height as f32;

        if cx < width * self.horizontal_threshold {
            StatusCode::FaceLeft
        } else if cx > width * (1.0 - self.horizontal_threshold) {
            StatusCode::FaceRight
        } else if cy < height * self.vertical_threshold {
            StatusCode::FaceUp
        } else if cy > height * (1.0 - self.vertical_threshold) {
            StatusCode::FaceDown
        } else {
            StatusCode::FaceCenter
        }
    }
}
