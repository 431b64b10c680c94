//! Debounce state machine

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Stabilizer configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    /// How long a candidate must stay unchanged before it is accepted (ms)
    pub stability_window_ms: u64,
    /// Minimum time between two reported changes (ms)
    pub min_spacing_ms: u64,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self::face()
    }
}

impl StabilizerConfig {
    /// Face zone: 700 ms window, 2 s spacing
    pub fn face() -> Self {
        Self {
            stability_window_ms: 700,
            min_spacing_ms: 2000,
        }
    }

    /// Motion: every genuine transition is reported
    pub fn motion() -> Self {
        Self {
            stability_window_ms: 0,
            min_spacing_ms: 0,
        }
    }

    /// Stability window as a duration
    pub fn stability_window(&self) -> Duration {
        Duration::from_millis(self.stability_window_ms)
    }

    /// Spacing guard as a duration
    pub fn min_spacing(&self) -> Duration {
        Duration::from_millis(self.min_spacing_ms)
    }
}

/// Where the stabilizer stands after the latest observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilizerPhase {
    /// Candidate observed, stability timer running
    Settling,
    /// Candidate is stable but the spacing guard is holding it back
    Held,
    /// Candidate accepted (reported now or earlier)
    Confirmed,
}

/// Mutable debounce state for one signal class
#[derive(Debug, Clone, Copy)]
pub struct StabilizerState<T> {
    pub pending_status: Option<T>,
    pub pending_since: Option<Instant>,
    pub last_sent_status: Option<T>,
    pub last_sent_at: Option<Instant>,
}

impl<T> Default for StabilizerState<T> {
    fn default() -> Self {
        Self {
            pending_status: None,
            pending_since: None,
            last_sent_status: None,
            last_sent_at: None,
        }
    }
}

/// An accepted status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition<T> {
    pub status: T,
    pub previous: Option<T>,
    pub at: Instant,
    /// How long the status had been stable when accepted
    pub stable_for: Duration,
}

/// Per-signal debounce with a minimum spacing between reports.
///
/// `observe` is called once per frame from a single thread.
#[derive(Debug)]
pub struct Stabilizer<T> {
    name: &'static str,
    config: StabilizerConfig,
    state: StabilizerState<T>,
    phase: StabilizerPhase,
}

impl<T: Copy + Eq + Debug> Stabilizer<T> {
    /// Create a stabilizer that has reported nothing yet
    pub fn new(name: &'static str, config: StabilizerConfig) -> Self {
        debug!("Creating {} stabilizer: {:?}", name, config);
        Self {
            name,
            config,
            state: StabilizerState::default(),
            phase: StabilizerPhase::Settling,
        }
    }

    /// Create a stabilizer that treats `status` as already reported, so it is
    /// never sent as the first change
    pub fn with_baseline(name: &'static str, config: StabilizerConfig, status: T) -> Self {
        let mut stabilizer = Self::new(name, config);
        stabilizer.state.last_sent_status = Some(status);
        stabilizer
    }

    /// Feed one per-frame candidate; returns the change to report, if any
    pub fn observe(&mut self, candidate: T, now: Instant) -> Option<Transition<T>> {
        let pending_since = match (self.state.pending_status, self.state.pending_since) {
            (Some(pending), Some(since)) if pending == candidate => since,
            _ => {
                self.state.pending_status = Some(candidate);
                self.state.pending_since = Some(now);
                self.phase = StabilizerPhase::Settling;
                return None;
            }
        };

        let stable_for = now.saturating_duration_since(pending_since);
        if stable_for < self.config.stability_window() {
            self.phase = StabilizerPhase::Settling;
            return None;
        }

        if self.state.last_sent_status == Some(candidate) {
            self.phase = StabilizerPhase::Confirmed;
            return None;
        }

        if let Some(last_sent_at) = self.state.last_sent_at {
            if now.saturating_duration_since(last_sent_at) < self.config.min_spacing() {
                if self.phase != StabilizerPhase::Held {
                    debug!("{} change to {:?} held by spacing guard", self.name, candidate);
                }
                self.phase = StabilizerPhase::Held;
                return None;
            }
        }

        let previous = self.state.last_sent_status.replace(candidate);
        self.state.last_sent_at = Some(now);
        self.phase = StabilizerPhase::Confirmed;

        info!(
            "{} status {:?} -> {:?} (stable {} ms)",
            self.name,
            previous,
            candidate,
            stable_for.as_millis()
        );

        Some(Transition {
            status: candidate,
            previous,
            at: now,
            stable_for,
        })
    }

    /// Signal class name used in logs
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Timing this stabilizer runs with
    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }

    /// Current debounce state
    pub fn state(&self) -> &StabilizerState<T> {
        &self.state
    }

    /// Phase after the latest observation
    pub fn phase(&self) -> StabilizerPhase {
        self.phase
    }

    /// Last status handed out as a change
    pub fn last_reported(&self) -> Option<T> {
        self.state.last_sent_status
    }
}
