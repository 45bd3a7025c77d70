use crate::error::{Result, SheetcountError};
use tracing::info;

/// Authoritative in-memory running total
///
/// Seeded once at startup from the last persisted value, then only ever
/// incremented by the frame loop that owns it.
#[derive(Debug, Default)]
pub struct CountLedger {
    total: u64,
    seeded: bool,
    counted_this_run: u64,
}

impl CountLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the starting total. Allowed exactly once, before any increment.
    pub fn seed(&mut self, initial_value: u64) -> Result<()> {
        if self.seeded || self.counted_this_run > 0 {
            return Err(SheetcountError::Ledger {
                message: "ledger has already been seeded".to_string(),
            });
        }

        self.total = initial_value;
        self.seeded = true;
        info!("Count ledger seeded at {}", initial_value);
        Ok(())
    }

    /// Record one counted sheet and return the new total
    pub fn increment(&mut self) -> u64 {
        self.total += 1;
        self.counted_this_run += 1;
        self.total
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Sheets counted since the ledger was seeded
    pub fn counted_this_run(&self) -> u64 {
        self.counted_this_run
    }
}
