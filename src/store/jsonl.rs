use super::CountStore;
use crate::error::StoreError;
use crate::events::CountEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// One line of the ledger file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCountRecord {
    pub id: u64,
    pub count: u64,
    pub recorded_at: DateTime<Utc>,
}

/// Append-only JSON-lines ledger file
///
/// Every record is written as one line and synced before `append` returns.
/// A torn last line (crash mid-write) is skipped when reading.
pub struct JsonlCountStore {
    path: PathBuf,
    next_id: Mutex<Option<u64>>,
}

impl JsonlCountStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            next_id: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every well-formed record, oldest first. A missing file holds no records.
    pub async fn read_records(&self) -> Result<Vec<StoredCountRecord>, StoreError> {
        Ok(self
            .read_content()
            .await?
            .map(|content| self.parse_records(&content))
            .unwrap_or_default())
    }

    async fn read_content(&self) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn parse_records(&self, content: &str) -> Vec<StoredCountRecord> {
        let mut records = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StoredCountRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    "Skipping malformed ledger line {} in {}: {}",
                    index + 1,
                    self.path.display(),
                    e
                ),
            }
        }
        records
    }

    async fn write_line(&self, line: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line).await?;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }
}

#[async_trait]
impl CountStore for JsonlCountStore {
    async fn append(&self, event: &CountEvent) -> Result<(), StoreError> {
        let mut next_id = self.next_id.lock().await;

        // On the first append, continue numbering from the file and terminate
        // a torn trailing line so the new record starts on its own line.
        let (id, mut line) = match *next_id {
            Some(id) => (id, Vec::new()),
            None => {
                let content = self.read_content().await?.unwrap_or_default();
                let id = self
                    .parse_records(&content)
                    .last()
                    .map_or(1, |record| record.id + 1);
                let line = if content.is_empty() || content.ends_with('\n') {
                    Vec::new()
                } else {
                    vec![b'\n']
                };
                (id, line)
            }
        };

        let record = StoredCountRecord {
            id,
            count: event.count,
            recorded_at: event.recorded_at,
        };
        serde_json::to_writer(&mut line, &record).map_err(|e| StoreError::Decode {
            details: e.to_string(),
        })?;
        line.push(b'\n');

        self.write_line(&line).await?;
        *next_id = Some(id + 1);

        debug!("Appended ledger record {} (count {})", id, record.count);
        Ok(())
    }

    async fn last_count(&self) -> Result<Option<u64>, StoreError> {
        Ok(self.read_records().await?.last().map(|record| record.count))
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}
