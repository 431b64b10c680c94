//! Process lifecycle

use anyhow::Context;
use audit_log::{AuditSink, AuditSubject, FileAuditLog};
use camera_capture::{FrameSource, ImageSequenceSource};
use collector::{
    fetch_identity, Deliver, EventDispatcher, FrameSlot, HttpSender, IdentityContext, Payload,
    SnapshotPublisher,
};
use perception::{PerceptionModule, StatusCode};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::capture::{CaptureLoop, CaptureStats};
use crate::config::MonitorConfig;
use crate::events::{AuditTrail, EventReporter};
use crate::output::{build_output, OutputSink};

/// Everything a monitoring session runs on, resolved at startup
pub struct Session<D> {
    pub identity: Arc<IdentityContext>,
    pub audit: Arc<dyn AuditSink>,
    pub output: Arc<dyn OutputSink>,
    pub sender: Arc<D>,
    pub source: Box<dyn FrameSource>,
    pub perception: PerceptionModule,
}

/// Bootstrap, monitor until Ctrl-C or camera loss, then shut down
pub async fn run(config: MonitorConfig) -> anyhow::Result<()> {
    let client = config.collector.http_client()?;
    let identity = fetch_identity(&client, &config.collector.session_url())
        .await
        .context("no active session; monitoring cannot start")?;
    let identity = Arc::new(identity);

    let subject = AuditSubject {
        student: identity.student.clone(),
        exam: identity.exam.clone(),
        session: identity.session.clone(),
    };
    let audit: Arc<dyn AuditSink> =
        Arc::new(FileAuditLog::open(&config.audit, subject).context("opening audit log")?);
    let output = build_output(&config.output, config.capture.jpeg_quality, audit.clone());
    let sender = Arc::new(HttpSender::new(client, &config.collector));

    let source =
        match ImageSequenceSource::open(&config.capture.source_dir, config.capture.loop_playback) {
            Ok(source) => source,
            Err(e) => {
                error!("Camera unavailable at startup: {}", e);
                let trail = AuditTrail::new(identity, audit.clone(), output);
                let event = trail.record(StatusCode::CameraUnavailable);
                if let Err(de) = sender.deliver(&Payload::Event(event)).await {
                    warn!("{} not delivered: {}", StatusCode::CameraUnavailable, de);
                }
                audit.close()?;
                return Err(e).context("camera unavailable");
            }
        };
    info!("Camera ready: {} images", source.len());

    let session = Session {
        identity,
        audit,
        output,
        sender,
        source: Box::new(source),
        perception: PerceptionModule::new(&config.perception),
    };

    monitor(session, &config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await?;
    Ok(())
}

/// Run one monitoring session until `shutdown` resolves or the capture loop
/// exits on its own
pub async fn monitor<D, F>(
    session: Session<D>,
    config: &MonitorConfig,
    shutdown: F,
) -> anyhow::Result<CaptureStats>
where
    D: Deliver,
    F: Future<Output = ()>,
{
    let Session {
        identity,
        audit,
        output,
        sender,
        source,
        perception,
    } = session;

    let trail = AuditTrail::new(identity.clone(), audit.clone(), output.clone());
    let (dispatcher, worker) = EventDispatcher::spawn(sender.clone());

    let slot = Arc::new(FrameSlot::new());
    let (stop_tx, stop_rx) = watch::channel(false);
    let publisher = SnapshotPublisher::new(
        slot.clone(),
        dispatcher.clone(),
        identity.clone(),
        config.collector.flush_interval(),
    )
    .spawn(stop_rx);

    EventReporter::new(trail.clone(), dispatcher.clone()).report(StatusCode::SessionStarted);
    output.set_overall_status("monitoring");

    let running = Arc::new(AtomicBool::new(true));
    let capture = CaptureLoop::new(
        source,
        perception,
        &config.capture,
        &config.stabilizer,
        EventReporter::new(trail.clone(), dispatcher),
        slot,
        running.clone(),
    );
    let mut capture_task = tokio::task::spawn_blocking(move || capture.run());

    tokio::pin!(shutdown);
    let joined = tokio::select! {
        joined = &mut capture_task => {
            warn!("Capture loop exited on its own");
            joined
        }
        _ = &mut shutdown => {
            info!("Shutdown requested");
            running.store(false, Ordering::Relaxed);
            (&mut capture_task).await
        }
    };
    if let Err(e) = &joined {
        error!("Capture loop panicked: {}", e);
    }

    // capture loop and publisher hold the last dispatcher handles
    let _ = stop_tx.send(true);
    if let Err(e) = publisher.await {
        warn!("Snapshot publisher ended abnormally: {}", e);
    }
    let stats_handle = worker.stats();
    if !worker.shutdown(config.collector.shutdown_grace()).await {
        warn!("Some queued payloads were not delivered");
    }

    let ended = trail.record(StatusCode::SessionEnded);
    match sender.deliver(&Payload::Event(ended)).await {
        Ok(()) => info!("{} delivered", StatusCode::SessionEnded),
        Err(e) => warn!("{} not delivered: {}", StatusCode::SessionEnded, e),
    }

    output.set_overall_status("stopped");
    audit.close().context("closing audit journal")?;

    let stats = joined.context("capture loop panicked")?;
    info!(
        "Session {} finished: {} frames, {} payloads delivered, {} failed",
        identity.session,
        stats.frames,
        stats_handle.delivered(),
        stats_handle.failed()
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::HeadlessOutput;
    use crate::testing::{MemoryAudit, RecordingSender, ScriptedSource, Step};
    use perception::ZoneClassifier;
    use std::time::Duration;

    fn session(
        frames: usize,
        audit: Arc<MemoryAudit>,
        sender: Arc<RecordingSender>,
    ) -> Session<RecordingSender> {
        Session {
            identity: Arc::new(IdentityContext::new("s-101", "calc-2", "room-3")),
            audit: audit.clone(),
            output: Arc::new(HeadlessOutput::new(audit)),
            sender,
            source: Box::new(ScriptedSource::frames(frames)),
            perception: PerceptionModule::with_classifiers(ZoneClassifier::default(), None, None),
        }
    }

    fn fast_config() -> MonitorConfig {
        let mut config = MonitorConfig::default();
        config.capture.fps = 1000;
        config.collector.flush_interval_ms = 10;
        config
    }

    #[tokio::test]
    async fn test_camera_loss_ends_session_cleanly() {
        let audit = Arc::new(MemoryAudit::default());
        let sender = Arc::new(RecordingSender::default());

        let stats = monitor(
            session(3, audit.clone(), sender.clone()),
            &fast_config(),
            std::future::pending(),
        )
        .await
        .unwrap();

        assert_eq!(stats.frames, 3);
        assert_eq!(
            sender.actions(),
            vec![
                StatusCode::SessionStarted,
                StatusCode::CameraUnavailable,
                StatusCode::SessionEnded,
            ]
        );
        assert_eq!(audit.closes(), 1);
        assert_eq!(audit.events().len(), 3);
    }

    #[tokio::test]
    async fn test_shutdown_request_stops_capture() {
        let audit = Arc::new(MemoryAudit::default());
        let sender = Arc::new(RecordingSender::default());
        let mut config = fast_config();
        config.capture.fps = 30;

        let stats = monitor(
            session(100_000, audit.clone(), sender.clone()),
            &config,
            tokio::time::sleep(Duration::from_millis(300)),
        )
        .await
        .unwrap();

        assert!(stats.frames > 0);
        let actions = sender.actions();
        assert_eq!(actions.first(), Some(&StatusCode::SessionStarted));
        assert_eq!(actions.last(), Some(&StatusCode::SessionEnded));
        assert!(!actions.contains(&StatusCode::CameraUnavailable));
        assert!(sender.frames() > 0);
        assert_eq!(audit.closes(), 1);
        assert_eq!(
            audit.lines().last().map(String::as_str),
            Some("[STATUS] stopped")
        );
    }

    #[tokio::test]
    async fn test_capture_panic_still_closes_session() {
        let audit = Arc::new(MemoryAudit::default());
        let sender = Arc::new(RecordingSender::default());
        let mut session = session(0, audit.clone(), sender.clone());
        session.source = Box::new(ScriptedSource::new(vec![Step::Frame, Step::Panic]));

        let result = monitor(session, &fast_config(), std::future::pending()).await;

        assert!(result.is_err());
        assert_eq!(
            sender.actions(),
            vec![StatusCode::SessionStarted, StatusCode::SessionEnded]
        );
        assert_eq!(audit.closes(), 1);
        assert_eq!(
            audit.lines().last().map(String::as_str),
            Some("[STATUS] stopped")
        );
    }
}
