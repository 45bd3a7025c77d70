use super::types::{ComponentState, ShutdownReason};
use crate::config::SheetcountConfig;
use crate::counter::CounterState;
use crate::detection::{Detector, RecordedDetector};
use crate::error::Result;
use crate::sink::EventSink;
use crate::source::FrameSource;
use crate::store::{build_store, CountStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Owns one counting run: store, source, counter state and persistence sink
pub struct SheetCounterApp {
    pub(super) config: SheetcountConfig,
    pub(super) store: Arc<dyn CountStore>,
    pub(super) detector: Box<dyn Detector>,
    pub(super) state: CounterState,

    // Created by start()
    pub(super) source: Option<Box<dyn FrameSource>>,
    pub(super) sink: Option<EventSink>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) signal_reason: Arc<parking_lot::Mutex<Option<ShutdownReason>>>,
    pub(super) signal_tasks: Vec<JoinHandle<()>>,
    pub(super) cancellation_token: CancellationToken,
}

impl SheetCounterApp {
    /// Create an app backed by the store named in the configuration
    pub fn new(config: SheetcountConfig) -> Result<Self> {
        let store = build_store(&config.persistence)?;
        Ok(Self::with_store(config, store))
    }

    /// Create an app over an existing store
    pub fn with_store(config: SheetcountConfig, store: Arc<dyn CountStore>) -> Self {
        let state = CounterState::new(&config.counting);

        Self {
            config,
            store,
            detector: Box::new(RecordedDetector::new()),
            state,
            source: None,
            sink: None,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            signal_reason: Arc::new(parking_lot::Mutex::new(None)),
            signal_tasks: Vec::new(),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Replace the detector applied to each frame
    pub fn set_detector(&mut self, detector: Box<dyn Detector>) {
        self.detector = detector;
    }

    /// Token that stops the frame loop when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub fn config(&self) -> &SheetcountConfig {
        &self.config
    }

    pub fn total(&self) -> u64 {
        self.state.total()
    }
}
