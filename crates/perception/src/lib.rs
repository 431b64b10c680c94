//! Perception for Vision Monitoring
//!
//! Per-frame classification of two independent signals:
//! - Subject position zone from face presence
//! - Scene motion presence
//!
//! Classifiers sit behind the [`FaceClassifier`] and [`MotionClassifier`]
//! traits; this crate only depends on the area and centroid of the regions
//! they return.

pub mod analysis;
pub mod config;
pub mod detector;
pub mod zone;

pub use analysis::{FaceSignal, FrameAnalysis, MotionSignal, SignalClass, StatusCode};
pub use config::{FaceConfig, MotionConfig, PerceptionConfig};
pub use detector::{
    FaceClassifier, MotionClassifier, MotionDetector, PreparedFrame, Rect, SkinFaceDetector,
};
pub use zone::ZoneClassifier;

use camera_capture::VideoFrame;
use thiserror::Error;
use tracing::{error, info, trace};

/// Perception error types
#[derive(Error, Debug)]
pub enum PerceptionError {
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Runs the enabled classifiers and the zone classifier on each frame
pub struct PerceptionModule {
    zone: ZoneClassifier,
    face: Option<Box<dyn FaceClassifier>>,
    motion: Option<Box<dyn MotionClassifier>>,
}

impl PerceptionModule {
    /// Build the built-in classifiers.
    ///
    /// A classifier that fails to initialize stays disabled for the lifetime
    /// of the module.
    pub fn new(config: &PerceptionConfig) -> Self {
        let face: Option<Box<dyn FaceClassifier>> = if config.face.enabled {
            match SkinFaceDetector::new(&config.face) {
                Ok(detector) => Some(Box::new(detector)),
                Err(e) => {
                    error!("Face detection disabled: {}", e);
                    None
                }
            }
        } else {
            info!("Face detection disabled by configuration");
            None
        };

        let motion: Option<Box<dyn MotionClassifier>> = if config.motion.enabled {
            match MotionDetector::new(&config.motion) {
                Ok(detector) => Some(Box::new(detector)),
                Err(e) => {
                    error!("Motion detection disabled: {}", e);
                    None
                }
            }
        } else {
            info!("Motion detection disabled by configuration");
            None
        };

        Self::with_classifiers(ZoneClassifier::from_config(&config.face), face, motion)
    }

    /// Use externally supplied classifiers
    pub fn with_classifiers(
        zone: ZoneClassifier,
        face: Option<Box<dyn FaceClassifier>>,
        motion: Option<Box<dyn MotionClassifier>>,
    ) -> Self {
        Self { zone, face, motion }
    }

    /// Whether a face classifier is running
    pub fn face_enabled(&self) -> bool {
        self.face.is_some()
    }

    /// Whether a motion classifier is running
    pub fn motion_enabled(&self) -> bool {
        self.motion.is_some()
    }

    /// Classify one frame
    pub fn analyze(&mut self, frame: &VideoFrame) -> FrameAnalysis {
        let prepared = PreparedFrame::new(frame);

        let face = self
            .face
            .as_mut()
            .map(|classifier| FaceSignal::from_candidates(classifier.classify_face(&prepared)));

        let face_status = face.as_ref().map(|signal| {
            self.zone
                .classify(signal.bbox.as_ref(), prepared.width(), prepared.height())
        });

        let motion = self
            .motion
            .as_mut()
            .map(|classifier| MotionSignal::from_regions(classifier.classify_motion(&prepared)));

        trace!(
            "Frame {}: face={:?} motion={:?}",
            frame.sequence,
            face_status,
            motion.as_ref().map(|m| m.regions.len())
        );

        FrameAnalysis {
            face,
            face_status,
            motion,
        }
    }
}
