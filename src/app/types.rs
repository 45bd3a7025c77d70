use crate::sink::SinkStatsSnapshot;

/// Component lifecycle states
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// Why a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    EndOfStream,
    Signal(String),
    Cancelled,
}

/// Outcome of one `run()`
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub frames_processed: u64,
    pub frames_dropped: u64,
    pub sheets_counted: u64,
    pub final_total: u64,
    pub sink: SinkStatsSnapshot,
    pub reason: ShutdownReason,
}
