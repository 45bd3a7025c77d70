use crate::frame::BoundingBox;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;
use tracing::trace;

/// A frame read from the stream but not yet taken by the counter
#[derive(Debug, Clone)]
pub struct PendingFrame {
    pub id: u64,
    pub boxes: Vec<BoundingBox>,
}

#[derive(Debug, Default)]
struct RingState {
    frames: VecDeque<PendingFrame>,
    closed: bool,
    next_id: u64,
}

/// Bounded latest-frame buffer between a stream reader and the counter
///
/// Pushing never waits: once `depth` frames are buffered the oldest is
/// overwritten. Taking returns the newest frame and discards everything
/// older, so the consumer never works on a stale frame.
pub struct FrameRing {
    state: Mutex<RingState>,
    notify: Notify,
    depth: usize,
    overruns: AtomicU64,
    discarded: AtomicU64,
}

impl FrameRing {
    pub fn new(depth: usize) -> Self {
        Self {
            state: Mutex::new(RingState::default()),
            notify: Notify::new(),
            depth: depth.max(1),
            overruns: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    /// Buffer a newly read frame. Ignored once the ring is closed.
    pub fn push(&self, boxes: Vec<BoundingBox>) {
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }

            let id = state.next_id;
            state.next_id += 1;
            state.frames.push_back(PendingFrame { id, boxes });

            while state.frames.len() > self.depth {
                state.frames.pop_front();
                self.overruns.fetch_add(1, Ordering::Relaxed);
                trace!("Frame ring overrun at depth {}", self.depth);
            }
        }
        self.notify.notify_one();
    }

    /// Mark the end of the stream; buffered frames can still be taken
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.notify.notify_one();
    }

    /// Newest buffered frame, dropping older unread ones. Waits while the
    /// ring is empty and returns `None` once it is closed and drained.
    pub async fn take_freshest(&self) -> Option<PendingFrame> {
        loop {
            {
                let mut state = self.state.lock();
                if let Some(frame) = state.frames.pop_back() {
                    let stale = state.frames.len() as u64;
                    state.frames.clear();
                    if stale > 0 {
                        self.discarded.fetch_add(stale, Ordering::Relaxed);
                    }
                    return Some(frame);
                }
                if state.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frames never delivered, either overwritten or skipped as stale
    pub fn dropped_frames(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed) + self.discarded.load(Ordering::Relaxed)
    }
}
