//! Per-frame perception results and status codes

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::detector::Rect;

/// Signal class a status code belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalClass {
    Face,
    Motion,
    Session,
}

impl SignalClass {
    /// Lowercase name used in logs and tags
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalClass::Face => "face",
            SignalClass::Motion => "motion",
            SignalClass::Session => "session",
        }
    }
}

/// Discrete status reported to the collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    NoFace,
    FaceLeft,
    FaceRight,
    FaceUp,
    FaceDown,
    FaceCenter,
    MotionDetected,
    MotionCeased,
    SessionStarted,
    SessionEnded,
    CameraUnavailable,
}

impl StatusCode {
    /// Wire name, e.g. `FACE_LEFT`
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::NoFace => "NO_FACE",
            StatusCode::FaceLeft => "FACE_LEFT",
            StatusCode::FaceRight => "FACE_RIGHT",
            StatusCode::FaceUp => "FACE_UP",
            StatusCode::FaceDown => "FACE_DOWN",
            StatusCode::FaceCenter => "FACE_CENTER",
            StatusCode::MotionDetected => "MOTION_DETECTED",
            StatusCode::MotionCeased => "MOTION_CEASED",
            StatusCode::SessionStarted => "SESSION_STARTED",
            StatusCode::SessionEnded => "SESSION_ENDED",
            StatusCode::CameraUnavailable => "CAMERA_UNAVAILABLE",
        }
    }

    /// Signal class this status belongs to
    pub fn class(&self) -> SignalClass {
        match self {
            StatusCode::NoFace
            | StatusCode::FaceLeft
            | StatusCode::FaceRight
            | StatusCode::FaceUp
            | StatusCode::FaceDown
            | StatusCode::FaceCenter => SignalClass::Face,
            StatusCode::MotionDetected | StatusCode::MotionCeased => SignalClass::Motion,
            StatusCode::SessionStarted
            | StatusCode::SessionEnded
            | StatusCode::CameraUnavailable => SignalClass::Session,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Face presence for one frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaceSignal {
    pub present: bool,
    pub bbox: Option<Rect>,
}

impl FaceSignal {
    /// Keep the largest candidate region
    pub fn from_candidates(candidates: Vec<Rect>) -> Self {
        let bbox = candidates.into_iter().max_by_key(|r| r.area());
        Self {
            present: bbox.is_some(),
            bbox,
        }
    }
}

/// Scene motion for one frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MotionSignal {
    pub present: bool,
    pub regions: Vec<Rect>,
}

impl MotionSignal {
    /// Motion is present if any region survived filtering
    pub fn from_regions(regions: Vec<Rect>) -> Self {
        Self {
            present: !regions.is_empty(),
            regions,
        }
    }

    /// MOTION_DETECTED while any region is present
    pub fn status(&self) -> StatusCode {
        if self.present {
            StatusCode::MotionDetected
        } else {
            StatusCode::MotionCeased
        }
    }
}

/// Complete perception result for one frame.
///
/// A `None` signal means that classifier is disabled.
#[derive(Debug, Clone, Default)]
pub struct FrameAnalysis {
    pub face: Option<FaceSignal>,
    /// Zone of the face signal
    pub face_status: Option<StatusCode>,
    pub motion: Option<MotionSignal>,
}

impl FrameAnalysis {
    /// Motion status, if the motion classifier ran
    pub fn motion_status(&self) -> Option<StatusCode> {
        self.motion.as_ref().map(MotionSignal::status)
    }
}
