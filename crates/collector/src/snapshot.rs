//! Latest-frame slot and its periodic publisher

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{EventDispatcher, IdentityContext, Payload, Snapshot};

/// Single-entry holder for the newest frame; a put overwrites any unread one.
#[derive(Debug, Default)]
pub struct FrameSlot {
    latest: Mutex<Option<Snapshot>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a snapshot. Returns true if an unread one was overwritten.
    pub fn put(&self, snapshot: Snapshot) -> bool {
        let mut latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        latest.replace(snapshot).is_some()
    }

    /// Take the snapshot out, leaving the slot empty
    pub fn take(&self) -> Option<Snapshot> {
        self.latest
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    pub fn is_empty(&self) -> bool {
        self.latest
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }
}

/// A slot bound to the identity its frames are published under, plus the
/// marker for a flush that is queued but not yet resolved.
#[derive(Debug)]
pub(crate) struct FrameFeed {
    slot: Arc<FrameSlot>,
    identity: Arc<IdentityContext>,
    queued: AtomicBool,
}

impl FrameFeed {
    /// Returns false if a flush is already queued
    pub(crate) fn claim(&self) -> bool {
        !self.queued.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn release(&self) {
        self.queued.store(false, Ordering::Release);
    }

    /// Called by the dispatch worker when the flush reaches the head of the
    /// queue. Takes whatever frame is newest at that moment.
    pub(crate) fn resolve(&self) -> Option<Payload> {
        self.release();
        self.slot.take().map(|snapshot| Payload::Frame {
            snapshot,
            identity: self.identity.clone(),
        })
    }
}

/// Drains the [`FrameSlot`] into the dispatcher on a fixed interval.
///
/// At most one flush waits in the dispatch queue at a time, so a slow
/// collector holds back at most one frame in flight plus the slot itself.
pub struct SnapshotPublisher {
    feed: Arc<FrameFeed>,
    dispatcher: EventDispatcher,
    interval: Duration,
}

impl SnapshotPublisher {
    /// Publisher over `slot`; frames go out under `identity`
    pub fn new(
        slot: Arc<FrameSlot>,
        dispatcher: EventDispatcher,
        identity: Arc<IdentityContext>,
        interval: Duration,
    ) -> Self {
        Self {
            feed: Arc::new(FrameFeed {
                slot,
                identity,
                queued: AtomicBool::new(false),
            }),
            dispatcher,
            interval,
        }
    }

    /// Queue a flush of the slot if it holds a frame and no earlier flush is
    /// still waiting. Returns true if a flush was queued.
    pub fn flush_once(&self) -> bool {
        if self.feed.slot.is_empty() {
            return false;
        }

        match self.dispatcher.submit_flush(&self.feed) {
            Ok(true) => true,
            Ok(false) => {
                debug!("Previous snapshot still queued; skipping flush");
                false
            }
            Err(e) => {
                warn!("Snapshot not queued: {}", e);
                false
            }
        }
    }

    /// Run until `shutdown` turns true or its sender is dropped
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "Snapshot publisher started (every {} ms)",
                self.interval.as_millis()
            );
            let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.flush_once();
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Snapshot publisher stopped");
        })
    }
}
