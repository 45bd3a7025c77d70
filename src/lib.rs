pub mod app;
pub mod config;
pub mod counter;
pub mod detection;
pub mod error;
pub mod events;
pub mod frame;
pub mod ledger;
pub mod sink;
pub mod source;
pub mod store;
pub mod tracking;

pub use app::{ComponentState, RunSummary, SheetCounterApp, ShutdownReason};
pub use config::SheetcountConfig;
pub use counter::{run_frame_loop, CounterState, LoopEnd, LoopSummary};
pub use detection::{CountingLane, Detection, Detector, RecordedDetector};
pub use error::{Result, SheetcountError, SourceError, StoreError};
pub use events::CountEvent;
pub use frame::{BoundingBox, FrameData};
pub use ledger::CountLedger;
pub use sink::{EventSink, SinkStatsSnapshot};
pub use source::{open_source, FrameRing, FrameSource, LiveSource, ReplaySource};
pub use store::{build_store, CountStore, JsonlCountStore, MemoryCountStore, RestCountStore};
pub use tracking::{Assignment, CrossingDetector, Track, TrackAssociator, TrackId};
