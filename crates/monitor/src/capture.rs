//! Per-frame driver: acquire, classify, stabilize, hand off

use camera_capture::{CameraError, CaptureConfig, FrameSource};
use collector::{FrameSlot, Snapshot};
use perception::{PerceptionModule, StatusCode};
use stabilizer::Stabilizer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::StabilizerSettings;
use crate::events::EventReporter;

/// Cadence accounting for one capture run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub frames: u64,
    pub read_errors: u64,
    pub deadline_misses: u64,
    pub worst_case: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// The camera is gone; the loop must exit
    Stop,
}

pub struct CaptureLoop {
    source: Box<dyn FrameSource>,
    perception: PerceptionModule,
    face: Stabilizer<StatusCode>,
    motion: Stabilizer<StatusCode>,
    reporter: EventReporter,
    slot: Arc<FrameSlot>,
    running: Arc<AtomicBool>,
    width: u32,
    height: u32,
    jpeg_quality: u8,
    frame_budget: Duration,
    camera_lost: bool,
    stats: CaptureStats,
}

impl CaptureLoop {
    /// Wire a capture loop; the motion stabilizer starts from MOTION_CEASED
    pub fn new(
        source: Box<dyn FrameSource>,
        perception: PerceptionModule,
        capture: &CaptureConfig,
        stabilizers: &StabilizerSettings,
        reporter: EventReporter,
        slot: Arc<FrameSlot>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            source,
            perception,
            face: Stabilizer::new("face", stabilizers.face),
            motion: Stabilizer::with_baseline(
                "motion",
                stabilizers.motion,
                StatusCode::MotionCeased,
            ),
            reporter,
            slot,
            running,
            width: capture.width,
            height: capture.height,
            jpeg_quality: capture.jpeg_quality,
            frame_budget: capture.frame_budget(),
            camera_lost: false,
            stats: CaptureStats::default(),
        }
    }

    /// Counters so far
    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    /// One capture tick, with `now` as the stabilizer clock
    pub fn tick_at(&mut self, now: Instant) -> TickOutcome {
        let frame = match self.source.read_frame() {
            Ok(frame) => frame,
            Err(e) if e.is_fatal() => {
                self.camera_unavailable(&e);
                return TickOutcome::Stop;
            }
            Err(e) => {
                warn!("Skipping tick: {}", e);
                self.stats.read_errors += 1;
                return TickOutcome::Continue;
            }
        };

        let frame = frame.resize(self.width, self.height);
        let analysis = self.perception.analyze(&frame);

        if let Some(status) = analysis.face_status {
            if let Some(transition) = self.face.observe(status, now) {
                self.reporter.report(transition.status);
            }
        }
        if let Some(status) = analysis.motion_status() {
            if let Some(transition) = self.motion.observe(status, now) {
                self.reporter.report(transition.status);
            }
        }

        match frame.encode_jpeg(self.jpeg_quality) {
            Ok(jpeg) => {
                self.slot.put(Snapshot {
                    jpeg,
                    captured_at_ms: chrono::Utc::now().timestamp_millis(),
                    sequence: frame.sequence,
                });
            }
            Err(e) => warn!("Snapshot skipped for frame {}: {}", frame.sequence, e),
        }

        self.reporter.trail().output().render_frame(&frame);
        self.stats.frames += 1;
        TickOutcome::Continue
    }

    fn camera_unavailable(&mut self, e: &CameraError) {
        if self.camera_lost {
            return;
        }
        self.camera_lost = true;
        error!("Camera unavailable: {}", e);
        self.reporter.report(StatusCode::CameraUnavailable);
        self.reporter
            .trail()
            .output()
            .append_log(&format!("camera unavailable: {}", e));
    }

    /// Run ticks at the frame budget until the run flag clears or the camera
    /// is lost. Blocks the calling thread.
    pub fn run(mut self) -> CaptureStats {
        info!(
            "Capture loop started on {} ({} ms budget)",
            self.source.describe(),
            self.frame_budget.as_millis()
        );

        while self.running.load(Ordering::Relaxed) {
            let cycle_start = Instant::now();
            let outcome = self.tick_at(cycle_start);
            let elapsed = cycle_start.elapsed();

            if elapsed > self.frame_budget {
                self.stats.deadline_misses += 1;
                debug!("Tick took {} ms", elapsed.as_millis());
            }
            if elapsed > self.stats.worst_case {
                self.stats.worst_case = elapsed;
            }

            if outcome == TickOutcome::Stop {
                self.running.store(false, Ordering::Relaxed);
                break;
            }
            if elapsed < self.frame_budget {
                std::thread::sleep(self.frame_budget - elapsed);
            }
        }

        info!(
            "Capture loop stopped: {} frames, {} read errors, {} deadline misses, worst {} ms",
            self.stats.frames,
            self.stats.read_errors,
            self.stats.deadline_misses,
            self.stats.worst_case.as_millis()
        );
        self.stats
    }
}
