use crate::config::{CountingConfig, SystemConfig};
use crate::detection::{CountingLane, Detector};
use crate::error::Result;
use crate::events::CountEvent;
use crate::frame::BoundingBox;
use crate::ledger::CountLedger;
use crate::sink::EventSink;
use crate::source::FrameSource;
use crate::tracking::{CrossingDetector, TrackAssociator};
use chrono::{DateTime, Utc};
use std::io::Write;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Everything the frame loop mutates, owned by the loop alone
///
/// Association and the crossing check run back to back inside
/// `process_frame`, so no other code can observe the track table between them.
#[derive(Debug)]
pub struct CounterState {
    lane: CountingLane,
    associator: TrackAssociator,
    crossing: CrossingDetector,
    ledger: CountLedger,
}

impl CounterState {
    pub fn new(config: &CountingConfig) -> Self {
        Self {
            lane: CountingLane::new(config.lane_x_min, config.lane_x_max),
            associator: TrackAssociator::new(
                config.track_match_distance_sq(),
                config.first_track_id,
            ),
            crossing: CrossingDetector::new(config.line_y),
            ledger: CountLedger::new(),
        }
    }

    /// Seed the running total; allowed once, before the first frame
    pub fn seed(&mut self, initial_value: u64) -> Result<()> {
        self.ledger.seed(initial_value)
    }

    /// Run one frame's detections through lane filter, association and
    /// crossing check. Returns one event per sheet counted in this frame.
    pub fn process_frame(
        &mut self,
        timestamp: DateTime<Utc>,
        raw_boxes: &[BoundingBox],
    ) -> Vec<CountEvent> {
        let detections = self.lane.filter(raw_boxes);
        let assignments = self.associator.associate(&detections);

        let mut events = Vec::new();
        for assignment in &assignments {
            if !self.crossing.check(assignment) {
                continue;
            }

            let total = self.ledger.increment();
            info!(
                "Sheet counted: track {} top edge {} (total {})",
                assignment.track_id, assignment.detection.top_edge_y, total
            );
            events.push(CountEvent::new(total, timestamp));
        }

        events
    }

    pub fn total(&self) -> u64 {
        self.ledger.total()
    }

    pub fn counted_this_run(&self) -> u64 {
        self.ledger.counted_this_run()
    }

    pub fn live_track_count(&self) -> usize {
        self.associator.live_count()
    }
}

/// Why the frame loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEnd {
    EndOfStream,
    Cancelled,
}

/// Frame loop totals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    pub frames_processed: u64,
    pub detector_failures: u64,
    pub ended: LoopEnd,
}

/// Periodic running-total and frame-rate report
struct StatusReporter {
    interval: Duration,
    status_line: bool,
    window_start: Instant,
    window_frames: u64,
}

impl StatusReporter {
    fn new(config: &SystemConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.status_interval_ms.max(1)),
            status_line: config.status_line,
            window_start: Instant::now(),
            window_frames: 0,
        }
    }

    fn frame_done(&mut self, total: u64, live_tracks: usize, frame_age_ms: i64) {
        self.window_frames += 1;

        let elapsed = self.window_start.elapsed();
        if elapsed < self.interval {
            return;
        }

        let fps = self.window_frames as f64 / elapsed.as_secs_f64();
        debug!(
            "Status: total {} fps {:.1} live tracks {} frame age {}ms",
            total, fps, live_tracks, frame_age_ms
        );
        if self.status_line {
            let mut stdout = std::io::stdout().lock();
            let _ = write!(stdout, "\rSheets: {} │ FPS: {:.1}   ", total, fps);
            let _ = stdout.flush();
        }

        self.window_start = Instant::now();
        self.window_frames = 0;
    }

    fn finish(&self) {
        if self.status_line {
            println!();
        }
    }
}

/// Drive frames from `source` through the counter until the stream ends or
/// `cancel` fires
///
/// Each iteration completes fully (detect, count, enqueue) before the next
/// frame is read. The only await point is the frame read itself; `enqueue`
/// never waits on persistence.
pub async fn run_frame_loop(
    source: &mut dyn FrameSource,
    detector: &mut dyn Detector,
    state: &mut CounterState,
    sink: &EventSink,
    confidence_threshold: f32,
    system: &SystemConfig,
    cancel: &CancellationToken,
) -> LoopSummary {
    let mut status = StatusReporter::new(system);
    let mut frames_processed = 0u64;
    let mut detector_failures = 0u64;

    let ended = loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break LoopEnd::Cancelled,
            frame = source.next_frame() => frame,
        };

        let Some(frame) = frame else {
            break LoopEnd::EndOfStream;
        };

        let boxes = match detector.detect(&frame, confidence_threshold) {
            Ok(boxes) => boxes,
            Err(e) => {
                detector_failures += 1;
                warn!("Detector failed on frame {}: {}", frame.id, e);
                Vec::new()
            }
        };

        for event in state.process_frame(frame.timestamp, &boxes) {
            sink.enqueue(event);
        }

        frames_processed += 1;
        status.frame_done(state.total(), state.live_track_count(), frame.age_ms());
    };

    status.finish();
    info!(
        "Frame loop ended ({:?}) after {} frames, {} dropped by the source",
        ended,
        frames_processed,
        source.dropped_frames()
    );

    LoopSummary {
        frames_processed,
        detector_failures,
        ended,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SheetcountError, StoreError};
    use crate::frame::FrameData;
    use crate::store::{CountStore, MemoryCountStore};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::VecDeque;
    use std::sync::Arc;

    fn counting_config() -> CountingConfig {
        CountingConfig {
            lane_x_min: 200,
            lane_x_max: 440,
            line_y: 300,
            track_match_distance: 80,
            first_track_id: 0,
        }
    }

    fn quiet_system() -> SystemConfig {
        SystemConfig {
            status_interval_ms: 1000,
            status_line: false,
        }
    }

    /// Box 50 px wide and 80 px tall centred on `cx`, with its top edge at `top`
    fn sheet(cx: f32, top: f32) -> BoundingBox {
        BoundingBox::from_corners(cx - 25.0, top, cx + 25.0, top + 80.0, 0.9)
    }

    fn at(second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 6, 0, second).unwrap()
    }

    /// Frames served from memory, one per call
    struct ScriptedSource {
        frames: VecDeque<Vec<BoundingBox>>,
        next_id: u64,
        released: bool,
    }

    impl ScriptedSource {
        fn new(frames: Vec<Vec<BoundingBox>>) -> Self {
            Self {
                frames: frames.into(),
                next_id: 0,
                released: false,
            }
        }
    }

    #[async_trait]
    impl FrameSource for ScriptedSource {
        async fn next_frame(&mut self) -> Option<FrameData> {
            let boxes = self.frames.pop_front()?;
            let id = self.next_id;
            self.next_id += 1;
            Some(FrameData::new(id, Utc::now(), boxes))
        }

        async fn release(&mut self) {
            self.released = true;
        }
    }

    /// Detector that fails on selected frames and passes boxes through otherwise
    struct FailingDetector {
        fail_on: Vec<u64>,
    }

    impl Detector for FailingDetector {
        fn detect(&mut self, frame: &FrameData, _threshold: f32) -> Result<Vec<BoundingBox>> {
            if self.fail_on.contains(&frame.id) {
                return Err(SheetcountError::component("detector", "inference failed"));
            }
            Ok(frame.boxes.clone())
        }
    }

    /// Store whose every write takes `delay`
    struct SlowStore {
        delay: Duration,
        inner: MemoryCountStore,
    }

    #[async_trait]
    impl CountStore for SlowStore {
        async fn append(&self, event: &CountEvent) -> std::result::Result<(), StoreError> {
            tokio::time::sleep(self.delay).await;
            self.inner.append(event).await
        }

        async fn last_count(&self) -> std::result::Result<Option<u64>, StoreError> {
            self.inner.last_count().await
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    #[test]
    fn test_sheet_moving_down_is_counted_once() {
        let mut state = CounterState::new(&counting_config());
        state.seed(0).unwrap();

        let mut totals = Vec::new();
        for (second, top) in [250.0, 270.0, 290.0, 310.0, 330.0].into_iter().enumerate() {
            let events = state.process_frame(at(second as u32), &[sheet(320.0, top)]);
            totals.extend(events.iter().map(|e| e.count));
        }

        assert_eq!(totals, vec![1]);
        assert_eq!(state.total(), 1);
    }

    #[test]
    fn test_event_carries_frame_timestamp_and_total() {
        let mut state = CounterState::new(&counting_config());
        state.seed(41).unwrap();

        state.process_frame(at(0), &[sheet(320.0, 290.0)]);
        let events = state.process_frame(at(1), &[sheet(320.0, 305.0)]);

        assert_eq!(events, vec![CountEvent::new(42, at(1))]);
    }

    #[test]
    fn test_detections_outside_lane_never_count() {
        let mut state = CounterState::new(&counting_config());
        state.seed(0).unwrap();

        for (second, top) in [250.0, 290.0, 310.0, 350.0].into_iter().enumerate() {
            let frame = [sheet(150.0, top), sheet(500.0, top)];
            assert!(state.process_frame(at(second as u32), &frame).is_empty());
        }

        assert_eq!(state.total(), 0);
        assert_eq!(state.live_track_count(), 0);
    }

    #[test]
    fn test_oscillating_edge_counts_once() {
        let mut state = CounterState::new(&counting_config());
        state.seed(0).unwrap();

        let mut fired = 0;
        for (second, top) in [295.0, 301.0, 296.0, 302.0, 297.0, 303.0]
            .into_iter()
            .enumerate()
        {
            fired += state
                .process_frame(at(second as u32), &[sheet(320.0, top)])
                .len();
        }

        assert_eq!(fired, 1);
        assert_eq!(state.total(), 1);
    }

    #[test]
    fn test_sheet_first_seen_below_line_is_not_counted() {
        let mut state = CounterState::new(&counting_config());
        state.seed(0).unwrap();

        assert!(state.process_frame(at(0), &[sheet(320.0, 320.0)]).is_empty());
        assert!(state.process_frame(at(1), &[sheet(320.0, 330.0)]).is_empty());
        assert_eq!(state.total(), 0);
    }

    #[test]
    fn test_two_sheets_in_one_frame_count_in_input_order() {
        let mut state = CounterState::new(&counting_config());
        state.seed(10).unwrap();

        state.process_frame(at(0), &[sheet(250.0, 290.0), sheet(400.0, 295.0)]);
        let events = state.process_frame(at(1), &[sheet(250.0, 305.0), sheet(400.0, 300.0)]);

        let counts: Vec<u64> = events.iter().map(|e| e.count).collect();
        assert_eq!(counts, vec![11, 12]);
    }

    #[test]
    fn test_out_of_range_corners_are_outside_the_lane() {
        let mut state = CounterState::new(&counting_config());
        state.seed(0).unwrap();

        for (second, record) in [
            r#"{"boxes":[[2000000000,0,2100000000,10,0.9]]}"#,
            r#"{"boxes":[[-1500000000,290,1500000000,310,0.9]]}"#,
        ]
        .into_iter()
        .enumerate()
        {
            let boxes = crate::source::parse_frame_record(record, second as u64 + 1).unwrap();
            assert!(state.process_frame(at(second as u32), &boxes).is_empty());
        }

        // neither centroid (x = 2050000000, x = 0) lies inside the lane
        assert_eq!(state.live_track_count(), 0);
        assert_eq!(state.total(), 0);
    }

    #[test]
    fn test_reseeding_is_rejected() {
        let mut state = CounterState::new(&counting_config());
        state.seed(3).unwrap();

        assert!(state.seed(5).is_err());
        assert_eq!(state.total(), 3);
    }

    #[tokio::test]
    async fn test_persisted_counts_match_in_memory_totals() {
        let store = Arc::new(MemoryCountStore::new());
        let mut sink = EventSink::start(store.clone(), 64);
        let mut state = CounterState::new(&counting_config());
        state.seed(7).unwrap();

        // two sheets, one after the other, each crossing the line once
        let mut source = ScriptedSource::new(vec![
            vec![sheet(320.0, 280.0)],
            vec![sheet(320.0, 310.0)],
            vec![],
            vec![sheet(260.0, 285.0)],
            vec![sheet(260.0, 300.0)],
        ]);
        let mut detector = crate::detection::RecordedDetector::new();

        let summary = run_frame_loop(
            &mut source,
            &mut detector,
            &mut state,
            &sink,
            0.5,
            &quiet_system(),
            &CancellationToken::new(),
        )
        .await;
        let stats = sink.shutdown(Duration::from_secs(2)).await;

        assert_eq!(summary.ended, LoopEnd::EndOfStream);
        assert_eq!(summary.frames_processed, 5);
        assert_eq!(stats.persisted, 2);

        let persisted: Vec<u64> = store.records().iter().map(|e| e.count).collect();
        assert_eq!(persisted, vec![8, 9]);
        assert_eq!(store.last_count().await.unwrap(), Some(state.total()));
    }

    #[tokio::test]
    async fn test_slow_store_does_not_stall_the_loop() {
        let store = Arc::new(SlowStore {
            delay: Duration::from_millis(200),
            inner: MemoryCountStore::new(),
        });
        let mut sink = EventSink::start(store.clone(), 1);
        let mut state = CounterState::new(&counting_config());
        state.seed(0).unwrap();

        // ten sheets side by side crossing in the same frame
        let before: Vec<BoundingBox> = (0..10).map(|i| sheet(205.0 + i as f32 * 25.0, 290.0)).collect();
        let after: Vec<BoundingBox> = (0..10).map(|i| sheet(205.0 + i as f32 * 25.0, 310.0)).collect();
        let mut source = ScriptedSource::new(vec![before, after]);
        let mut detector = crate::detection::RecordedDetector::new();

        let started = Instant::now();
        run_frame_loop(
            &mut source,
            &mut detector,
            &mut state,
            &sink,
            0.5,
            &quiet_system(),
            &CancellationToken::new(),
        )
        .await;
        assert!(started.elapsed() < Duration::from_millis(150));

        // the in-memory total is unaffected by dropped events
        assert_eq!(state.total(), 10);
        let stats = sink.stats();
        assert!(stats.dropped >= 8);
        assert_eq!(stats.enqueued + stats.dropped, 10);

        sink.shutdown(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_detector_failure_skips_frame() {
        let store = Arc::new(MemoryCountStore::new());
        let mut sink = EventSink::start(store, 8);
        let mut state = CounterState::new(&counting_config());
        state.seed(0).unwrap();

        let mut source = ScriptedSource::new(vec![
            vec![sheet(320.0, 290.0)],
            vec![sheet(320.0, 295.0)],
            vec![sheet(320.0, 305.0)],
        ]);
        let mut detector = FailingDetector { fail_on: vec![1] };

        let summary = run_frame_loop(
            &mut source,
            &mut detector,
            &mut state,
            &sink,
            0.5,
            &quiet_system(),
            &CancellationToken::new(),
        )
        .await;
        sink.shutdown(Duration::from_secs(1)).await;

        // the failed frame empties the track table, so frame 2 starts a new track
        assert_eq!(summary.frames_processed, 3);
        assert_eq!(summary.detector_failures, 1);
        assert_eq!(state.total(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_loop_stops_before_reading() {
        let store = Arc::new(MemoryCountStore::new());
        let mut sink = EventSink::start(store, 8);
        let mut state = CounterState::new(&counting_config());
        state.seed(0).unwrap();

        let mut source = ScriptedSource::new(vec![vec![sheet(320.0, 290.0)]; 4]);
        let mut detector = crate::detection::RecordedDetector::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = run_frame_loop(
            &mut source,
            &mut detector,
            &mut state,
            &sink,
            0.5,
            &quiet_system(),
            &cancel,
        )
        .await;
        sink.shutdown(Duration::from_secs(1)).await;

        assert_eq!(summary.ended, LoopEnd::Cancelled);
        assert_eq!(summary.frames_processed, 0);
        assert!(!source.released);
    }
}
