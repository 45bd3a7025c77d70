use super::CountStore;
use crate::error::StoreError;
use crate::events::CountEvent;
use async_trait::async_trait;
use parking_lot::Mutex;

/// Process-local store; records are lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryCountStore {
    records: Mutex<Vec<CountEvent>>,
}

impl MemoryCountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with existing records, oldest first
    pub fn with_records(records: Vec<CountEvent>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    pub fn records(&self) -> Vec<CountEvent> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl CountStore for MemoryCountStore {
    async fn append(&self, event: &CountEvent) -> Result<(), StoreError> {
        self.records.lock().push(*event);
        Ok(())
    }

    async fn last_count(&self) -> Result<Option<u64>, StoreError> {
        Ok(self.records.lock().last().map(|record| record.count))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
