use crate::error::Result;
use crate::frame::{BoundingBox, FrameData};
use tracing::trace;

/// Object detector collaborator
///
/// Implementations return the boxes found in a frame whose confidence is at
/// least `confidence_threshold`. No ordering of the returned boxes is implied.
pub trait Detector: Send {
    fn detect(&mut self, frame: &FrameData, confidence_threshold: f32) -> Result<Vec<BoundingBox>>;
}

/// Detector for frames that already carry the output of an upstream model
#[derive(Debug, Default, Clone)]
pub struct RecordedDetector;

impl RecordedDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Detector for RecordedDetector {
    fn detect(&mut self, frame: &FrameData, confidence_threshold: f32) -> Result<Vec<BoundingBox>> {
        Ok(frame
            .boxes
            .iter()
            .filter(|b| b.confidence >= confidence_threshold)
            .copied()
            .collect())
    }
}

/// A detection reduced to the coordinates the tracker works with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub centroid_x: i32,
    pub centroid_y: i32,
    pub top_edge_y: i32,
}

impl Detection {
    pub fn from_box(bbox: &BoundingBox) -> Self {
        let (x1, y1, x2, y2) = bbox.pixel_corners();
        Self {
            centroid_x: midpoint(x1, x2),
            centroid_y: midpoint(y1, y2),
            top_edge_y: y1,
        }
    }
}

/// Floor of the mean, summed in i64 so corners near the i32 limits cannot overflow
fn midpoint(a: i32, b: i32) -> i32 {
    (a as i64 + b as i64).div_euclid(2) as i32
}

/// Horizontal band of the image in which detections are counted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountingLane {
    pub x_min: i32,
    pub x_max: i32,
}

impl CountingLane {
    pub fn new(x_min: i32, x_max: i32) -> Self {
        Self { x_min, x_max }
    }

    /// Inclusive on both edges
    pub fn contains(&self, x: i32) -> bool {
        self.x_min <= x && x <= self.x_max
    }

    /// Reduce raw boxes to detections whose centroid lies inside the lane,
    /// keeping input order
    pub fn filter(&self, raw_boxes: &[BoundingBox]) -> Vec<Detection> {
        raw_boxes
            .iter()
            .map(Detection::from_box)
            .filter(|d| {
                let keep = self.contains(d.centroid_x);
                if !keep {
                    trace!("Discarding detection outside lane at x={}", d.centroid_x);
                }
                keep
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn bbox(x1: f32, y1: f32, x2: f32, y2: f32) -> BoundingBox {
        BoundingBox::from_corners(x1, y1, x2, y2, 0.9)
    }

    #[test]
    fn test_centroid_of_extreme_corners() {
        let far_right = Detection::from_box(&bbox(2.0e9, 0.0, 2.1e9, 10.0));
        assert!(far_right.centroid_x > 2_000_000_000);
        assert!(!CountingLane::new(200, 440).contains(far_right.centroid_x));

        let spanning = Detection::from_box(&bbox(-1.5e9, -1.5e9, 1.5e9, 1.5e9));
        assert_eq!(spanning.centroid_x, 0);
        assert_eq!(spanning.centroid_y, 0);

        let saturated = Detection::from_box(&bbox(f32::MAX, 0.0, f32::MAX, 10.0));
        assert_eq!(saturated.centroid_x, i32::MAX);
    }

    #[test]
    fn test_detection_geometry() {
        let d = Detection::from_box(&bbox(201.0, 290.0, 250.0, 341.0));

        assert_eq!(d.centroid_x, 225);
        assert_eq!(d.centroid_y, 315);
        assert_eq!(d.top_edge_y, 290);
    }

    #[test]
    fn test_lane_edges_are_inclusive() {
        let lane = CountingLane::new(200, 440);
        // centroids at exactly 200 and 440, plus one just outside each edge
        let boxes = vec![
            bbox(190.0, 0.0, 210.0, 10.0),
            bbox(430.0, 0.0, 450.0, 10.0),
            bbox(189.0, 0.0, 209.0, 10.0),
            bbox(431.0, 0.0, 451.0, 10.0),
        ];

        let kept = lane.filter(&boxes);

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].centroid_x, 200);
        assert_eq!(kept[1].centroid_x, 440);
    }

    #[test]
    fn test_filter_preserves_input_order() {
        let lane = CountingLane::new(0, 1000);
        let boxes = vec![
            bbox(500.0, 50.0, 520.0, 70.0),
            bbox(100.0, 10.0, 120.0, 30.0),
            bbox(300.0, 90.0, 320.0, 110.0),
        ];

        let xs: Vec<i32> = lane.filter(&boxes).iter().map(|d| d.centroid_x).collect();

        assert_eq!(xs, vec![510, 110, 310]);
    }

    #[test]
    fn test_recorded_detector_applies_threshold() {
        let frame = FrameData::new(
            0,
            Utc::now(),
            vec![
                BoundingBox::from_corners(0.0, 0.0, 10.0, 10.0, 0.49),
                BoundingBox::from_corners(0.0, 0.0, 10.0, 10.0, 0.5),
                BoundingBox::from_corners(0.0, 0.0, 10.0, 10.0, 0.95),
            ],
        );

        let boxes = RecordedDetector::new().detect(&frame, 0.5).unwrap();

        assert_eq!(boxes.len(), 2);
        assert!(boxes.iter().all(|b| b.confidence >= 0.5));
    }
}
