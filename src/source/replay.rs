use super::record::parse_frame_record;
use super::{FrameSource, StreamReader};
use crate::frame::FrameData;
use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, Lines};
use tracing::{debug, warn};

/// Recorded stream delivered frame by frame, without skipping
pub struct ReplaySource {
    lines: Option<Lines<StreamReader>>,
    line_no: u64,
    next_id: u64,
}

impl ReplaySource {
    pub fn new(reader: StreamReader) -> Self {
        Self {
            lines: Some(reader.lines()),
            line_no: 0,
            next_id: 0,
        }
    }
}

#[async_trait]
impl FrameSource for ReplaySource {
    async fn next_frame(&mut self) -> Option<FrameData> {
        let lines = self.lines.as_mut()?;

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!("Replay finished after {} lines", self.line_no);
                    return None;
                }
                Err(e) => {
                    warn!("Replay read failed: {}", e);
                    return None;
                }
            };
            self.line_no += 1;

            if line.trim().is_empty() {
                continue;
            }

            return match parse_frame_record(&line, self.line_no) {
                Ok(boxes) => {
                    let id = self.next_id;
                    self.next_id += 1;
                    Some(FrameData::new(id, Utc::now(), boxes))
                }
                Err(e) => {
                    warn!("Ending replay on unreadable frame: {}", e);
                    None
                }
            };
        }
    }

    async fn release(&mut self) {
        self.lines.take();
    }
}
