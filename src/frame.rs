use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Axis-aligned box reported by the detector, in source pixel units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

impl BoundingBox {
    /// Create a box from two opposite corners; corners are reordered so that
    /// `(x1, y1)` is the top-left one
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
            confidence,
        }
    }

    /// Corners truncated to whole pixels
    pub fn pixel_corners(&self) -> (i32, i32, i32, i32) {
        (
            self.x1 as i32,
            self.y1 as i32,
            self.x2 as i32,
            self.y2 as i32,
        )
    }
}

/// One frame taken from the source, stamped at the moment it was read
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Per-source frame sequence number
    pub id: u64,
    /// Capture time (when the frame was read, not when it was analysed)
    pub timestamp: DateTime<Utc>,
    /// Detector input for this frame
    pub boxes: Vec<BoundingBox>,
}

impl FrameData {
    pub fn new(id: u64, timestamp: DateTime<Utc>, boxes: Vec<BoundingBox>) -> Self {
        Self {
            id,
            timestamp,
            boxes,
        }
    }

    /// Get frame age in milliseconds
    pub fn age_ms(&self) -> i64 {
        (Utc::now() - self.timestamp).num_milliseconds().max(0)
    }
}
