//! Face and motion classifiers

use camera_capture::VideoFrame;
use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use imageproc::region_labelling::{connected_components, Connectivity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::{FaceConfig, MotionConfig};
use crate::PerceptionError;

/// Axis-aligned region in frame pixel space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Area in pixels
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Centroid in pixel coordinates
    pub fn center(&self) -> (f32, f32) {
        (
            self.x as f32 + self.width as f32 / 2.0,
            self.y as f32 + self.height as f32 / 2.0,
        )
    }
}

/// Frame views shared by the classifiers for one tick
pub struct PreparedFrame<'a> {
    pub rgb: &'a RgbImage,
    pub gray: GrayImage,
}

impl<'a> PreparedFrame<'a> {
    /// Borrow the RGB image and compute its grayscale once
    pub fn new(frame: &'a VideoFrame) -> Self {
        Self {
            rgb: &frame.image,
            gray: frame.to_grayscale(),
        }
    }

    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }
}

/// Face presence collaborator: candidate face regions for a frame
pub trait FaceClassifier: Send {
    fn classify_face(&mut self, frame: &PreparedFrame<'_>) -> Vec<Rect>;
}

/// Motion collaborator: foreground regions for a frame
pub trait MotionClassifier: Send {
    fn classify_motion(&mut self, frame: &PreparedFrame<'_>) -> Vec<Rect>;
}

/// Connected foreground blob
#[derive(Debug, Clone, Copy)]
struct Component {
    bbox: Rect,
    /// Pixel count
    area: u64,
}

/// Label the non-zero pixels of a binary mask after a 3x3 opening
fn foreground_components(mask: &GrayImage) -> Vec<Component> {
    let cleaned = morphology::open(mask, Norm::LInf, 1);
    let labels = connected_components(&cleaned, Connectivity::Eight, Luma([0u8]));

    // label -> (min_x, min_y, max_x, max_y, count)
    let mut extents: HashMap<u32, (u32, u32, u32, u32, u64)> = HashMap::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0];
        if label == 0 {
            continue;
        }
        let entry = extents.entry(label).or_insert((x, y, x, y, 0));
        entry.0 = entry.0.min(x);
        entry.1 = entry.1.min(y);
        entry.2 = entry.2.max(x);
        entry.3 = entry.3.max(y);
        entry.4 += 1;
    }

    extents
        .into_values()
        .map(|(x0, y0, x1, y1, count)| Component {
            bbox: Rect::new(x0, y0, x1 - x0 + 1, y1 - y0 + 1),
            area: count,
        })
        .collect()
}

/// Face presence from skin chroma (YCbCr box test).
///
/// Returns the bounding boxes of skin blobs whose aspect ratio looks like a face.
pub struct SkinFaceDetector {
    min_aspect: f32,
    max_aspect: f32,
}

impl SkinFaceDetector {
    /// Validate `config` and build the detector
    pub fn new(config: &FaceConfig) -> Result<Self, PerceptionError> {
        config.validate()?;
        info!(
            "Skin-chroma face detector ready (aspect {:.2}..{:.2})",
            config.min_aspect, config.max_aspect
        );
        Ok(Self {
            min_aspect: config.min_aspect,
            max_aspect: config.max_aspect,
        })
    }

    fn is_skin(rgb: [u8; 3]) -> bool {
        let (r, g, b) = (rgb[0] as f32, rgb[1] as f32, rgb[2] as f32);
        let cb = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
        let cr = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
        (77.0..=127.0).contains(&cb) && (133.0..=173.0).contains(&cr)
    }
}

impl FaceClassifier for SkinFaceDetector {
    fn classify_face(&mut self, frame: &PreparedFrame<'_>) -> Vec<Rect> {
        let mut mask = GrayImage::new(frame.width(), frame.height());
        for (x, y, pixel) in frame.rgb.enumerate_pixels() {
            if Self::is_skin(pixel.0) {
                mask.put_pixel(x, y, Luma([255]));
            }
        }

        foreground_components(&mask)
            .into_iter()
            .filter(|c| {
                let aspect = c.bbox.width as f32 / c.bbox.height as f32;
                aspect >= self.min_aspect && aspect <= self.max_aspect
            })
            .map(|c| c.bbox)
            .collect()
    }
}

/// Motion from a running-average background model.
///
/// The first frame (or a frame with new dimensions) only seeds the background.
pub struct MotionDetector {
    area_threshold: u64,
    difference_threshold: f32,
    learning_rate: f32,
    background: Vec<f32>,
    dims: (u32, u32),
}

impl MotionDetector {
    /// Validate `config` and build the detector
    pub fn new(config: &MotionConfig) -> Result<Self, PerceptionError> {
        config.validate()?;
        info!(
            "Motion detector ready (area > {} px², diff {}, rate {})",
            config.area_threshold, config.difference_threshold, config.learning_rate
        );
        Ok(Self {
            area_threshold: config.area_threshold,
            difference_threshold: config.difference_threshold as f32,
            learning_rate: config.learning_rate,
            background: Vec::new(),
            dims: (0, 0),
        })
    }

    fn foreground_mask(&mut self, gray: &GrayImage) -> Option<GrayImage> {
        let dims = gray.dimensions();
        if self.dims != dims || self.background.is_empty() {
            debug!("Seeding motion background at {}x{}", dims.0, dims.1);
            self.background = gray.pixels().map(|p| p[0] as f32).collect();
            self.dims = dims;
            return None;
        }

        let mut mask = GrayImage::new(dims.0, dims.1);
        for ((bg, pixel), out) in self
            .background
            .iter_mut()
            .zip(gray.pixels())
            .zip(mask.pixels_mut())
        {
            let value = pixel[0] as f32;
            if (value - *bg).abs() > self.difference_threshold {
                out[0] = 255;
            }
            *bg += self.learning_rate * (value - *bg);
        }
        Some(mask)
    }
}

impl MotionClassifier for MotionDetector {
    fn classify_motion(&mut self, frame: &PreparedFrame<'_>) -> Vec<Rect> {
        let mask = match self.foreground_mask(&frame.gray) {
            Some(mask) => mask,
            None => return Vec::new(),
        };

        foreground_components(&mask)
            .into_iter()
            .filter(|c| c.area > self.area_threshold)
            .map(|c| c.bbox)
            .collect()
    }
}
