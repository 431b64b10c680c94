//! Status Stabilizer
//!
//! Turns noisy per-frame classifications into stable, rate-limited status
//! changes, one stabilizer per signal class.

mod stabilizer;

pub use stabilizer::{Stabilizer, StabilizerConfig, StabilizerPhase, StabilizerState, Transition};
