use crate::events::CountEvent;
use crate::store::CountStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Counters shared between the frame loop and the persistence worker
#[derive(Debug, Default)]
pub struct SinkStats {
    pub enqueued: AtomicU64,
    pub dropped: AtomicU64,
    pub persisted: AtomicU64,
    pub failed: AtomicU64,
}

impl SinkStats {
    /// Get current statistics as a snapshot
    pub fn snapshot(&self) -> SinkStatsSnapshot {
        SinkStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStatsSnapshot {
    pub enqueued: u64,
    pub dropped: u64,
    pub persisted: u64,
    pub failed: u64,
}

/// Fire-and-forget persistence of count events
///
/// `enqueue` never waits: when the bounded queue is full the event is
/// dropped. One worker task stores queued events one at a time; a failed
/// write is logged and forgotten.
pub struct EventSink {
    sender: Option<mpsc::Sender<CountEvent>>,
    worker: Option<JoinHandle<()>>,
    stats: Arc<SinkStats>,
}

impl EventSink {
    /// Spawn the persistence worker on the current tokio runtime
    pub fn start(store: Arc<dyn CountStore>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        let stats = Arc::new(SinkStats::default());

        let worker = tokio::spawn(persist_events(receiver, store, Arc::clone(&stats)));

        info!("Event sink started with queue capacity {}", capacity);
        Self {
            sender: Some(sender),
            worker: Some(worker),
            stats,
        }
    }

    /// Queue an event for persistence. Returns false if it was dropped.
    pub fn enqueue(&self, event: CountEvent) -> bool {
        let Some(sender) = &self.sender else {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        };

        match sender.try_send(event) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(event)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("Persistence queue full, dropping count {}", event.count);
                false
            }
            Err(TrySendError::Closed(event)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("Persistence queue closed, dropping count {}", event.count);
                false
            }
        }
    }

    pub fn stats(&self) -> SinkStatsSnapshot {
        self.stats.snapshot()
    }

    /// Close the queue and give the worker up to `timeout` to store what is
    /// left. Anything still queued after that is lost.
    pub async fn shutdown(&mut self, timeout: Duration) -> SinkStatsSnapshot {
        self.sender.take();

        if let Some(mut worker) = self.worker.take() {
            match tokio::time::timeout(timeout, &mut worker).await {
                Ok(Ok(())) => debug!("Persistence worker drained"),
                Ok(Err(e)) => warn!("Persistence worker ended abnormally: {}", e),
                Err(_) => {
                    worker.abort();
                    warn!(
                        "Persistence queue not drained within {:?}, remaining events discarded",
                        timeout
                    );
                }
            }
        }

        let stats = self.stats.snapshot();
        info!(
            "Event sink stopped (enqueued {}, persisted {}, failed {}, dropped {})",
            stats.enqueued, stats.persisted, stats.failed, stats.dropped
        );
        stats
    }
}

async fn persist_events(
    mut receiver: mpsc::Receiver<CountEvent>,
    store: Arc<dyn CountStore>,
    stats: Arc<SinkStats>,
) {
    debug!("Persistence worker started ({} store)", store.name());

    while let Some(event) = receiver.recv().await {
        match store.append(&event).await {
            Ok(()) => {
                stats.persisted.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!("Failed to persist {}: {}", event.description(), e);
            }
        }
    }

    debug!("Persistence worker stopped");
}
