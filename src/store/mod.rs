mod jsonl;
mod memory;
mod rest;

pub use jsonl::{JsonlCountStore, StoredCountRecord};
pub use memory::MemoryCountStore;
pub use rest::RestCountStore;

use crate::config::{PersistenceConfig, StoreBackend};
use crate::error::{Result, SheetcountError, StoreError};
use crate::events::CountEvent;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Durable append-only home of the count records
#[async_trait]
pub trait CountStore: Send + Sync {
    /// Store one count record
    async fn append(&self, event: &CountEvent) -> std::result::Result<(), StoreError>;

    /// Count of the most recently stored record, if any
    async fn last_count(&self) -> std::result::Result<Option<u64>, StoreError>;

    /// Short name used in log records
    fn name(&self) -> &'static str;
}

/// Build the store selected by the persistence configuration
pub fn build_store(config: &PersistenceConfig) -> Result<Arc<dyn CountStore>> {
    let store: Arc<dyn CountStore> = match config.backend {
        StoreBackend::Memory => Arc::new(MemoryCountStore::new()),
        StoreBackend::Jsonl => Arc::new(JsonlCountStore::new(&config.path)),
        StoreBackend::Rest => {
            let url = config.url.as_deref().ok_or_else(|| {
                SheetcountError::component("store", "rest backend requires a url")
            })?;
            let api_key = config.api_key.as_deref().ok_or_else(|| {
                SheetcountError::component("store", "rest backend requires an api_key")
            })?;
            Arc::new(RestCountStore::new(
                url,
                api_key,
                &config.table,
                Duration::from_millis(config.request_timeout_ms),
            ))
        }
    };

    info!("Using {} count store", store.name());
    Ok(store)
}
