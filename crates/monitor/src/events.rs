//! Recording and reporting accepted status changes

use audit_log::AuditSink;
use collector::{EventDispatcher, IdentityContext, OutboundEvent, Payload};
use perception::{SignalClass, StatusCode};
use std::sync::Arc;
use tracing::warn;

use crate::output::OutputSink;

/// Confidence stamped on journal entries; identifies the capture device
pub const JOURNAL_CONFIDENCE: u8 = 2;

fn class_label(class: SignalClass) -> &'static str {
    match class {
        SignalClass::Face => "Face",
        SignalClass::Motion => "Motion",
        SignalClass::Session => "Session",
    }
}

/// Local record of every reported status: audit log plus output sink
#[derive(Clone)]
pub struct AuditTrail {
    identity: Arc<IdentityContext>,
    audit: Arc<dyn AuditSink>,
    output: Arc<dyn OutputSink>,
}

impl AuditTrail {
    pub fn new(
        identity: Arc<IdentityContext>,
        audit: Arc<dyn AuditSink>,
        output: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            identity,
            audit,
            output,
        }
    }

    /// Write the change locally and build the event for the collector.
    /// Audit failures are logged; they never stop monitoring.
    pub fn record(&self, status: StatusCode) -> OutboundEvent {
        let class = status.class();
        let line = format!(
            "[{} | {}] {}: {} (SENT)",
            self.identity.student,
            self.identity.exam,
            class_label(class),
            status
        );

        if let Err(e) = self.audit.log_line(&line) {
            warn!("Audit line not written: {}", e);
        }
        if let Err(e) = self
            .audit
            .log_event(class.as_str(), status.as_str(), JOURNAL_CONFIDENCE)
        {
            warn!("Audit journal entry not written: {}", e);
        }
        self.output.report_status(class, status);

        OutboundEvent::new(status, &self.identity)
    }

    /// Identity every record is tagged with
    pub fn identity(&self) -> &Arc<IdentityContext> {
        &self.identity
    }

    /// Underlying audit sink
    pub fn audit(&self) -> &Arc<dyn AuditSink> {
        &self.audit
    }

    /// Presentation sink status changes go to
    pub fn output(&self) -> &Arc<dyn OutputSink> {
        &self.output
    }
}

/// Records a change and queues it for delivery
pub struct EventReporter {
    trail: AuditTrail,
    dispatcher: EventDispatcher,
}

impl EventReporter {
    pub fn new(trail: AuditTrail, dispatcher: EventDispatcher) -> Self {
        Self { trail, dispatcher }
    }

    /// Record `status`, then queue it for delivery
    pub fn report(&self, status: StatusCode) {
        let event = self.trail.record(status);
        if let Err(e) = self.dispatcher.submit(Payload::Event(event)) {
            warn!("{} not queued: {}", status, e);
        }
    }

    /// Trail this reporter writes through
    pub fn trail(&self) -> &AuditTrail {
        &self.trail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::HeadlessOutput;
    use crate::testing::{MemoryAudit, RecordingSender};

    #[tokio::test]
    async fn test_report_writes_locally_and_dispatches() {
        let audit = Arc::new(MemoryAudit::default());
        let output = Arc::new(HeadlessOutput::new(audit.clone()));
        let identity = Arc::new(IdentityContext::new("s-101", "calc-2", "room-3"));
        let trail = AuditTrail::new(identity, audit.clone(), output);

        let sender = Arc::new(RecordingSender::default());
        let (dispatcher, worker) = EventDispatcher::spawn(sender.clone());
        let reporter = EventReporter::new(trail, dispatcher);

        reporter.report(StatusCode::FaceRight);
        drop(reporter);
        assert!(worker.shutdown(std::time::Duration::from_secs(1)).await);

        assert_eq!(
            audit.lines(),
            vec!["[s-101 | calc-2] Face: FACE_RIGHT (SENT)", "[FACE] FACE_RIGHT"]
        );
        assert_eq!(
            audit.events(),
            vec![("face".to_string(), "FACE_RIGHT".to_string(), 2)]
        );
        assert_eq!(sender.actions(), vec![StatusCode::FaceRight]);
    }
}
