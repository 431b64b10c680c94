//! Still-image sequence replayed as a video feed

use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use crate::{CameraError, FrameSource, VideoFrame};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Frame source over a directory of still images, read in lexical order
pub struct ImageSequenceSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    next: usize,
    loop_playback: bool,
    sequence: u32,
    started: Instant,
}

impl ImageSequenceSource {
    /// Open a directory; fails if it holds no image files
    pub fn open(dir: impl AsRef<Path>, loop_playback: bool) -> Result<Self, CameraError> {
        let dir = dir.as_ref().to_path_buf();
        let entries = std::fs::read_dir(&dir)
            .map_err(|e| CameraError::Open(format!("{}: {}", dir.display(), e)))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_image(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(CameraError::Open(format!(
                "no image frames found in {}",
                dir.display()
            )));
        }

        info!("Opened image sequence {} ({} frames)", dir.display(), files.len());

        Ok(Self {
            dir,
            files,
            next: 0,
            loop_playback,
            sequence: 0,
            started: Instant::now(),
        })
    }

    /// Number of images in the sequence
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn is_image(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        if self.next >= self.files.len() {
            if !self.loop_playback {
                return Err(CameraError::Closed);
            }
            debug!("Image sequence wrapped around");
            self.next = 0;
        }

        let path = &self.files[self.next];
        self.next += 1;

        let decoded = image::open(path)
            .map_err(|e| CameraError::Read(format!("{}: {}", path.display(), e)))?;

        let frame = VideoFrame::new(
            decoded.to_rgb8(),
            self.started.elapsed().as_nanos() as u64,
            self.sequence,
        );
        self.sequence = self.sequence.wrapping_add(1);
        Ok(frame)
    }

    fn describe(&self) -> String {
        format!("image sequence {}", self.dir.display())
    }
}
