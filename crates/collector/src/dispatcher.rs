//! Ordered, non-blocking payload dispatch on a single worker task

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::snapshot::FrameFeed;
use crate::{CollectorError, Deliver, Payload};

/// Delivery counters
#[derive(Debug, Default)]
pub struct DispatchStats {
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl DispatchStats {
    /// Payloads the collector accepted
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Payloads dropped after a failed attempt
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Queue entry. A frame flush carries no frame; the worker reads the slot
/// when the entry reaches the head of the queue.
#[derive(Debug)]
enum Job {
    Send(Payload),
    FlushFrame(Arc<FrameFeed>),
}

/// Submission handle. Cheap to clone; every clone feeds the same FIFO queue.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    tx: mpsc::UnboundedSender<Job>,
    stats: Arc<DispatchStats>,
}

/// The single delivery task behind an [`EventDispatcher`]
#[derive(Debug)]
pub struct DispatchWorker {
    handle: JoinHandle<()>,
    stats: Arc<DispatchStats>,
}

impl EventDispatcher {
    /// Start the delivery worker. Must be called inside a tokio runtime.
    pub fn spawn<D: Deliver>(sender: Arc<D>) -> (Self, DispatchWorker) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let stats = Arc::new(DispatchStats::default());

        let worker_stats = stats.clone();
        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let payload = match job {
                    Job::Send(payload) => payload,
                    Job::FlushFrame(feed) => match feed.resolve() {
                        Some(payload) => payload,
                        None => continue,
                    },
                };
                match sender.deliver(&payload).await {
                    Ok(()) => {
                        worker_stats.delivered.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        worker_stats.failed.fetch_add(1, Ordering::Relaxed);
                        warn!("Dropping {}: {}", payload.describe(), e);
                    }
                }
            }
            debug!("Dispatch queue closed");
        });

        info!("Event dispatcher started");
        (
            Self {
                tx,
                stats: stats.clone(),
            },
            DispatchWorker { handle, stats },
        )
    }

    /// Queue a payload and return immediately
    pub fn submit(&self, payload: Payload) -> Result<(), CollectorError> {
        self.tx
            .send(Job::Send(payload))
            .map_err(|_| CollectorError::Closed)
    }

    /// Queue a flush of `feed`'s latest frame unless one is already waiting.
    /// Returns false if an earlier flush is still queued.
    pub(crate) fn submit_flush(&self, feed: &Arc<FrameFeed>) -> Result<bool, CollectorError> {
        if !feed.claim() {
            return Ok(false);
        }
        self.tx.send(Job::FlushFrame(feed.clone())).map_err(|_| {
            feed.release();
            CollectorError::Closed
        })?;
        Ok(true)
    }

    /// Shared delivery counters
    pub fn stats(&self) -> Arc<DispatchStats> {
        self.stats.clone()
    }
}

impl DispatchWorker {
    /// Wait for the queue to drain once every [`EventDispatcher`] handle has
    /// been dropped. After `grace` the worker is aborted and whatever is
    /// still queued is lost. Returns true if the queue drained in time.
    pub async fn shutdown(self, grace: Duration) -> bool {
        let mut handle = self.handle;
        let drained = match tokio::time::timeout(grace, &mut handle).await {
            Ok(_) => true,
            Err(_) => {
                handle.abort();
                warn!(
                    "Dispatch queue not drained within {} ms; abandoning pending payloads",
                    grace.as_millis()
                );
                false
            }
        };

        info!(
            "Event dispatcher stopped: {} delivered, {} failed",
            self.stats.delivered(),
            self.stats.failed()
        );
        drained
    }

    /// Counters that outlive the worker
    pub fn stats(&self) -> Arc<DispatchStats> {
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSender;
    use crate::{IdentityContext, OutboundEvent};
    use perception::{SignalClass, StatusCode};

    fn event(action: StatusCode, timestamp_ms: i64) -> Payload {
        Payload::Event(OutboundEvent::at(
            action,
            &IdentityContext::new("s", "e", "x"),
            timestamp_ms,
        ))
    }

    fn timestamps_for(payloads: &[Payload], class: SignalClass) -> Vec<i64> {
        payloads
            .iter()
            .filter_map(|p| match p {
                Payload::Event(e) if e.action.class() == class => Some(e.timestamp),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_per_class_order_with_concurrent_submitters() {
        let sender = Arc::new(RecordingSender::default());
        let (dispatcher, worker) = EventDispatcher::spawn(sender.clone());

        let face = dispatcher.clone();
        let face_task = tokio::spawn(async move {
            for i in 0..50 {
                let action = if i % 2 == 0 {
                    StatusCode::FaceLeft
                } else {
                    StatusCode::FaceCenter
                };
                face.submit(event(action, i)).unwrap();
                tokio::task::yield_now().await;
            }
        });

        let motion = dispatcher.clone();
        let motion_task = tokio::spawn(async move {
            for i in 0..50 {
                let action = if i % 2 == 0 {
                    StatusCode::MotionDetected
                } else {
                    StatusCode::MotionCeased
                };
                motion.submit(event(action, i)).unwrap();
                tokio::task::yield_now().await;
            }
        });

        face_task.await.unwrap();
        motion_task.await.unwrap();
        drop(dispatcher);
        assert!(worker.shutdown(Duration::from_secs(5)).await);

        let payloads = sender.payloads();
        assert_eq!(payloads.len(), 100);
        let expected: Vec<i64> = (0..50).collect();
        assert_eq!(timestamps_for(&payloads, SignalClass::Face), expected);
        assert_eq!(timestamps_for(&payloads, SignalClass::Motion), expected);
    }

    #[tokio::test]
    async fn test_failure_does_not_block_later_deliveries() {
        let sender = Arc::new(RecordingSender {
            fail_first: 2,
            ..Default::default()
        });
        let (dispatcher, worker) = EventDispatcher::spawn(sender.clone());
        let stats = dispatcher.stats();

        for i in 0..5 {
            dispatcher.submit(event(StatusCode::FaceUp, i)).unwrap();
        }
        drop(dispatcher);
        assert!(worker.shutdown(Duration::from_secs(5)).await);

        // every payload attempted exactly once, no retries
        assert_eq!(sender.payloads().len(), 5);
        assert_eq!(stats.failed(), 2);
        assert_eq!(stats.delivered(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_does_not_wait_for_slow_delivery() {
        let sender = Arc::new(RecordingSender {
            delay: Some(Duration::from_secs(10)),
            ..Default::default()
        });
        let (dispatcher, worker) = EventDispatcher::spawn(sender.clone());

        let before = tokio::time::Instant::now();
        for i in 0..20 {
            dispatcher.submit(event(StatusCode::FaceDown, i)).unwrap();
        }
        assert_eq!(tokio::time::Instant::now(), before);

        drop(dispatcher);
        assert!(worker.shutdown(Duration::from_secs(300)).await);
        assert_eq!(sender.payloads().len(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_abandons_queue_after_grace() {
        let sender = Arc::new(RecordingSender {
            delay: Some(Duration::from_secs(10)),
            ..Default::default()
        });
        let (dispatcher, worker) = EventDispatcher::spawn(sender.clone());

        for i in 0..3 {
            dispatcher.submit(event(StatusCode::MotionDetected, i)).unwrap();
        }
        drop(dispatcher);

        // first payload lands at 10 s, the second would need 20 s
        assert!(!worker.shutdown(Duration::from_secs(15)).await);
        assert_eq!(sender.payloads().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_after_worker_gone_is_closed() {
        let sender = Arc::new(RecordingSender::default());
        let (dispatcher, worker) = EventDispatcher::spawn(sender);

        // the live handle keeps the queue open, so the worker is aborted
        assert!(!worker.shutdown(Duration::from_millis(100)).await);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(matches!(
            dispatcher.submit(event(StatusCode::FaceCenter, 0)),
            Err(CollectorError::Closed)
        ));
    }
}
