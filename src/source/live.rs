use super::record::parse_frame_record;
use super::ring::FrameRing;
use super::{FrameSource, StreamReader};
use crate::frame::FrameData;
use async_trait::async_trait;
use chrono::Utc;
use std::io::BufRead;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Blocking line reader, read on its own thread
pub type BlockingStreamReader = Box<dyn BufRead + Send>;

/// Live stream read in the background into a latest-frame ring
pub struct LiveSource {
    ring: Arc<FrameRing>,
    reader_task: Option<JoinHandle<()>>,
}

impl LiveSource {
    /// Start reading `reader` on a tokio task, buffering at most `buffer_depth` frames
    pub fn spawn(reader: StreamReader, buffer_depth: usize) -> Self {
        let ring = Arc::new(FrameRing::new(buffer_depth));
        let reader_task = tokio::spawn(read_stream(reader, Arc::clone(&ring)));

        debug!("Live source started with buffer depth {}", buffer_depth);
        Self {
            ring,
            reader_task: Some(reader_task),
        }
    }

    /// Start reading `reader` on a dedicated OS thread
    ///
    /// For inputs whose reads cannot be cancelled, such as standard input.
    /// `release` closes the ring at once; the thread is detached and exits on
    /// its next line or end of input.
    pub fn spawn_thread(reader: BlockingStreamReader, buffer_depth: usize) -> std::io::Result<Self> {
        let ring = Arc::new(FrameRing::new(buffer_depth));
        let thread_ring = Arc::clone(&ring);

        std::thread::Builder::new()
            .name("frame-reader".to_string())
            .spawn(move || read_blocking(reader, thread_ring))?;

        debug!(
            "Live source started on reader thread with buffer depth {}",
            buffer_depth
        );
        Ok(Self {
            ring,
            reader_task: None,
        })
    }

    pub fn ring(&self) -> Arc<FrameRing> {
        Arc::clone(&self.ring)
    }
}

/// Push one line into the ring. Returns false when the stream should end.
fn accept_line(ring: &FrameRing, line: &str, line_no: u64) -> bool {
    if line.trim().is_empty() {
        return true;
    }
    match parse_frame_record(line, line_no) {
        Ok(boxes) => {
            ring.push(boxes);
            true
        }
        Err(e) => {
            warn!("Ending stream on unreadable frame: {}", e);
            false
        }
    }
}

async fn read_stream(reader: StreamReader, ring: Arc<FrameRing>) {
    let mut lines = reader.lines();
    let mut line_no = 0u64;

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                line_no += 1;
                if !accept_line(&ring, &line, line_no) {
                    break;
                }
            }
            Ok(None) => {
                info!("Frame stream ended after {} lines", line_no);
                break;
            }
            Err(e) => {
                warn!("Frame stream read failed: {}", e);
                break;
            }
        }
    }

    ring.close();
}

fn read_blocking(reader: BlockingStreamReader, ring: Arc<FrameRing>) {
    let mut line_no = 0u64;

    for line in reader.lines() {
        if ring.is_closed() {
            debug!("Frame reader thread stopping, source released");
            return;
        }
        match line {
            Ok(line) => {
                line_no += 1;
                if !accept_line(&ring, &line, line_no) {
                    break;
                }
            }
            Err(e) => {
                warn!("Frame stream read failed: {}", e);
                break;
            }
        }
    }

    if !ring.is_closed() {
        info!("Frame stream ended after {} lines", line_no);
    }
    ring.close();
}

#[async_trait]
impl FrameSource for LiveSource {
    async fn next_frame(&mut self) -> Option<FrameData> {
        let pending = self.ring.take_freshest().await?;
        Some(FrameData::new(pending.id, Utc::now(), pending.boxes))
    }

    async fn release(&mut self) {
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        self.ring.close();
        debug!("Live source released");
    }

    fn dropped_frames(&self) -> u64 {
        self.ring.dropped_frames()
    }
}

impl Drop for LiveSource {
    fn drop(&mut self) {
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        self.ring.close();
    }
}
