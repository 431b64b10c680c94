//! Perception configuration

use serde::{Deserialize, Serialize};

use crate::PerceptionError;

/// Perception configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    pub face: FaceConfig,
    pub motion: MotionConfig,
}

/// Face classifier and zone thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceConfig {
    /// Run the face classifier at all
    pub enabled: bool,

    /// Boxes smaller than this (px²) count as no face
    pub min_area: u64,

    /// Fraction of frame width marking the left/right zones
    pub horizontal_threshold: f32,

    /// Fraction of frame height marking the up/down zones
    pub vertical_threshold: f32,

    /// Accepted width/height ratio range for skin regions
    pub min_aspect: f32,
    pub max_aspect: f32,
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_area: 2500,
            horizontal_threshold: 0.30,
            vertical_threshold: 0.30,
            min_aspect: 0.5,
            max_aspect: 1.6,
        }
    }
}

impl FaceConfig {
    /// Check zone thresholds and the aspect range
    pub fn validate(&self) -> Result<(), PerceptionError> {
        for (name, value) in [
            ("horizontal_threshold", self.horizontal_threshold),
            ("vertical_threshold", self.vertical_threshold),
        ] {
            if !(value > 0.0 && value < 0.5) {
                return Err(PerceptionError::Config(format!(
                    "{} must be in (0, 0.5), got {}",
                    name, value
                )));
            }
        }
        if !(self.min_aspect > 0.0 && self.min_aspect <= self.max_aspect) {
            return Err(PerceptionError::Config(format!(
                "invalid aspect range {}..{}",
                self.min_aspect, self.max_aspect
            )));
        }
        Ok(())
    }
}

/// Motion classifier thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Run the motion classifier at all
    pub enabled: bool,

    /// Foreground regions must be larger than this (px²)
    pub area_threshold: u64,

    /// Per-pixel difference from background that counts as foreground
    pub difference_threshold: u8,

    /// Background adaptation rate per frame (0-1]
    pub learning_rate: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            area_threshold: 1000,
            difference_threshold: 25,
            learning_rate: 0.05,
        }
    }
}

impl MotionConfig {
    /// Check the learning rate and difference threshold
    pub fn validate(&self) -> Result<(), PerceptionError> {
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(PerceptionError::Config(format!(
                "learning_rate must be in (0, 1], got {}",
                self.learning_rate
            )));
        }
        if self.difference_threshold == 0 {
            return Err(PerceptionError::Config(
                "difference_threshold must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
