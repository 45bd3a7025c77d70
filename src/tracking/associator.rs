use crate::detection::Detection;
use std::collections::BTreeMap;
use tracing::trace;

pub type TrackId = u64;

/// Last known position of an object believed present in the previous frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Track {
    pub id: TrackId,
    pub centroid_x: i32,
    pub centroid_y: i32,
    pub top_edge_y: i32,
}

impl Track {
    fn at(id: TrackId, detection: &Detection) -> Self {
        Self {
            id,
            centroid_x: detection.centroid_x,
            centroid_y: detection.centroid_y,
            top_edge_y: detection.top_edge_y,
        }
    }

    fn distance_sq(&self, detection: &Detection) -> i64 {
        let dx = detection.centroid_x as i64 - self.centroid_x as i64;
        let dy = detection.centroid_y as i64 - self.centroid_y as i64;
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }
}

/// Track identity given to one detection of the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub track_id: TrackId,
    pub detection: Detection,
    /// State of the matched track in the previous frame; `None` for a freshly minted track
    pub previous: Option<Track>,
}

impl Assignment {
    pub fn is_new_track(&self) -> bool {
        self.previous.is_none()
    }
}

/// Greedy nearest-centroid frame-to-frame associator
///
/// Every detection is compared against the tracks that were live in the
/// previous frame only. Two detections of the same frame may therefore claim
/// the same track; the later one then defines the track's position for the
/// next frame. Tracks that receive no detection are dropped, and identities
/// are never handed out twice.
#[derive(Debug, Clone)]
pub struct TrackAssociator {
    live: BTreeMap<TrackId, Track>,
    next_id: TrackId,
    dist_threshold_sq: i64,
}

impl TrackAssociator {
    pub fn new(dist_threshold_sq: i64, first_id: TrackId) -> Self {
        Self {
            live: BTreeMap::new(),
            next_id: first_id,
            dist_threshold_sq,
        }
    }

    /// Assign every detection to a track and replace the live set with the
    /// tracks seen in this frame
    pub fn associate(&mut self, detections: &[Detection]) -> Vec<Assignment> {
        let mut next_live = BTreeMap::new();
        let mut assignments = Vec::with_capacity(detections.len());

        for detection in detections {
            let previous = self.nearest(detection);

            let track_id = match previous {
                Some(track) => track.id,
                None => self.mint(),
            };

            trace!(
                "Detection at ({}, {}) assigned to track {}{}",
                detection.centroid_x,
                detection.centroid_y,
                track_id,
                if previous.is_none() { " (new)" } else { "" }
            );

            next_live.insert(track_id, Track::at(track_id, detection));
            assignments.push(Assignment {
                track_id,
                detection: *detection,
                previous,
            });
        }

        self.live = next_live;
        assignments
    }

    /// Closest previous-frame track strictly within the threshold. Ties go to
    /// the lowest track identity.
    fn nearest(&self, detection: &Detection) -> Option<Track> {
        let mut best: Option<(i64, &Track)> = None;
        for track in self.live.values() {
            let d2 = track.distance_sq(detection);
            if best.map_or(true, |(best_d2, _)| d2 < best_d2) {
                best = Some((d2, track));
            }
        }

        best.filter(|(d2, _)| *d2 < self.dist_threshold_sq)
            .map(|(_, track)| *track)
    }

    fn mint(&mut self) -> TrackId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Tracks seen in the most recent frame, ordered by identity
    pub fn live_tracks(&self) -> impl Iterator<Item = &Track> {
        self.live.values()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Identity the next new track will receive
    pub fn next_id(&self) -> TrackId {
        self.next_id
    }
}
