use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One counted sheet, as handed to the persistence queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountEvent {
    /// Ledger total right after this sheet was counted
    pub count: u64,
    /// Capture time of the frame in which the crossing was seen
    pub recorded_at: DateTime<Utc>,
}

impl CountEvent {
    pub fn new(count: u64, recorded_at: DateTime<Utc>) -> Self {
        Self { count, recorded_at }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        format!(
            "Sheet count {} at {}",
            self.count,
            self.recorded_at.to_rfc3339()
        )
    }
}
