mod live;
mod record;
mod replay;
mod ring;

pub use live::{BlockingStreamReader, LiveSource};
pub use record::parse_frame_record;
pub use replay::ReplaySource;
pub use ring::{FrameRing, PendingFrame};

use crate::config::StreamConfig;
use crate::error::{Result, SourceError};
use crate::frame::FrameData;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::info;

/// Boxed line-oriented input a source reads from
pub type StreamReader = Box<dyn AsyncBufRead + Unpin + Send>;

/// Pull-based frame stream
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame to process, or `None` when the stream has ended or can no
    /// longer be read
    async fn next_frame(&mut self) -> Option<FrameData>;

    /// Stop reading and release the underlying stream
    async fn release(&mut self);

    /// Frames the source skipped to stay current
    fn dropped_frames(&self) -> u64 {
        0
    }
}

/// Open the source described by the stream configuration
pub async fn open_source(config: &StreamConfig) -> Result<Box<dyn FrameSource>> {
    let uri = config.source.trim();

    if uri == "-" && config.live {
        info!("Reading frames from standard input");
        let reader: BlockingStreamReader = Box::new(std::io::BufReader::new(std::io::stdin()));
        let source =
            LiveSource::spawn_thread(reader, config.buffer_depth).map_err(|e| {
                SourceError::Unavailable {
                    uri: uri.to_string(),
                    details: e.to_string(),
                }
            })?;
        return Ok(Box::new(source));
    }

    let reader: StreamReader = if uri == "-" {
        info!("Replaying frames from standard input");
        Box::new(BufReader::new(tokio::io::stdin()))
    } else {
        let path = source_path(uri)?;
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| SourceError::Unavailable {
                uri: uri.to_string(),
                details: e.to_string(),
            })?;
        info!("Reading frames from {}", path.display());
        Box::new(BufReader::new(file))
    };

    let source: Box<dyn FrameSource> = if config.live {
        Box::new(LiveSource::spawn(reader, config.buffer_depth))
    } else {
        Box::new(ReplaySource::new(reader))
    };

    Ok(source)
}

fn source_path(uri: &str) -> std::result::Result<PathBuf, SourceError> {
    if let Some(path) = uri.strip_prefix("file://") {
        return Ok(PathBuf::from(path));
    }

    if let Some((scheme, _)) = uri.split_once("://") {
        return Err(SourceError::Unavailable {
            uri: uri.to_string(),
            details: format!("unsupported scheme '{}'", scheme),
        });
    }

    Ok(PathBuf::from(uri))
}
