//! Video frame types and processing

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};

use crate::CameraError;

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data
    pub image: RgbImage,
    /// Capture timestamp (nanoseconds since source start)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Wrap a decoded RGB image
    pub fn new(image: RgbImage, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            image,
            timestamp_ns,
            sequence,
        }
    }

    /// Frame width
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Frame height
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        self.image.get_pixel_checked(x, y).map(|p| p.0)
    }

    /// Convert to grayscale
    pub fn to_grayscale(&self) -> GrayImage {
        imageops::grayscale(&self.image)
    }

    /// Resize to the given dimensions; returns the frame unchanged if it already matches
    pub fn resize(self, new_width: u32, new_height: u32) -> VideoFrame {
        if self.width() == new_width && self.height() == new_height {
            return self;
        }

        VideoFrame {
            image: imageops::resize(&self.image, new_width, new_height, FilterType::Triangle),
            timestamp_ns: self.timestamp_ns,
            sequence: self.sequence,
        }
    }

    /// Compress the frame to JPEG
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, CameraError> {
        let mut out = Vec::with_capacity((self.width() * self.height() / 8) as usize);
        let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
        encoder
            .encode_image(&self.image)
            .map_err(|e| CameraError::Encode(e.to_string()))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> VideoFrame {
        VideoFrame::new(RgbImage::from_pixel(width, height, Rgb(rgb)), 0, 0)
    }

    #[test]
    fn test_resize_to_canonical() {
        let frame = solid(1280, 720, [10, 20, 30]).resize(640, 480);
        assert_eq!(frame.width(), 640);
        assert_eq!(frame.height(), 480);
        assert_eq!(frame.get_pixel(100, 100), Some([10, 20, 30]));
        assert_eq!(frame.get_pixel(640, 0), None);
    }

    #[test]
    fn test_grayscale_luma() {
        let gray = solid(8, 8, [255, 255, 255]).to_grayscale();
        assert_eq!(gray.get_pixel(3, 3).0[0], 255);
    }

    #[test]
    fn test_encode_jpeg_has_soi_marker() {
        let jpeg = solid(32, 32, [200, 100, 50]).encode_jpeg(70).unwrap();
        assert!(jpeg.len() > 4);
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }
}
