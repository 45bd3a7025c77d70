use super::associator::{Assignment, TrackId};
use std::collections::HashSet;
use tracing::debug;

/// Fires once per track when its top edge moves from above the counting line
/// to on or below it
#[derive(Debug, Clone)]
pub struct CrossingDetector {
    line_y: i32,
    counted: HashSet<TrackId>,
}

impl CrossingDetector {
    pub fn new(line_y: i32) -> Self {
        Self {
            line_y,
            counted: HashSet::new(),
        }
    }

    /// Returns true (and remembers the track) iff
    /// `previous_top_y < line_y <= current_top_y` and the track has not fired before
    pub fn detect_crossing(
        &mut self,
        track_id: TrackId,
        previous_top_y: i32,
        current_top_y: i32,
    ) -> bool {
        if !(previous_top_y < self.line_y && self.line_y <= current_top_y) {
            return false;
        }

        if !self.counted.insert(track_id) {
            debug!(
                "Track {} crossed line {} again, already counted",
                track_id, self.line_y
            );
            return false;
        }

        true
    }

    /// Crossing check for one association result. A new track has no previous
    /// top edge; its own centroid stands in, so it cannot fire on first sight.
    pub fn check(&mut self, assignment: &Assignment) -> bool {
        let previous_top_y = assignment
            .previous
            .map(|track| track.top_edge_y)
            .unwrap_or(assignment.detection.centroid_y);

        self.detect_crossing(
            assignment.track_id,
            previous_top_y,
            assignment.detection.top_edge_y,
        )
    }

    pub fn is_counted(&self, track_id: TrackId) -> bool {
        self.counted.contains(&track_id)
    }

    pub fn counted_len(&self) -> usize {
        self.counted.len()
    }
}
