//! Vision Monitoring Client
//!
//! Wires the pipeline together and owns the process lifecycle:
//! - Identity bootstrap and audit log setup
//! - Capture loop on a blocking thread at the frame budget
//! - Event dispatch and snapshot publishing on the async runtime
//! - Cooperative shutdown with a final session event

pub mod app;
pub mod capture;
pub mod config;
pub mod events;
pub mod output;

pub use app::run;
pub use capture::{CaptureLoop, CaptureStats, TickOutcome};
pub use config::MonitorConfig;
pub use events::{AuditTrail, EventReporter};
pub use output::{build_output, HeadlessOutput, OutputSink, PreviewOutput};

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Initialize logging
pub fn init_logging(level: &str, json: bool) -> anyhow::Result<()> {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    let result = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.map_err(|e| anyhow::anyhow!("failed to set tracing subscriber: {}", e))
}
