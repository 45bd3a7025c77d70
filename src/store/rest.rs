use super::CountStore;
use crate::error::StoreError;
use crate::events::CountEvent;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct CountRow {
    count: u64,
}

/// Ledger table behind a PostgREST-style HTTP interface
///
/// Requests are blocking and run on the tokio blocking pool.
#[derive(Clone)]
pub struct RestCountStore {
    agent: ureq::Agent,
    table_url: String,
    api_key: String,
}

impl RestCountStore {
    pub fn new(base_url: &str, api_key: &str, table: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();

        Self {
            agent,
            table_url: table_endpoint(base_url, table),
            api_key: api_key.to_string(),
        }
    }

    pub fn table_url(&self) -> &str {
        &self.table_url
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        self.agent
            .request(method, url)
            .set("apikey", &self.api_key)
            .set("Authorization", &format!("Bearer {}", self.api_key))
    }

    fn insert_blocking(&self, event: &CountEvent) -> Result<(), StoreError> {
        let body = serde_json::json!({
            "count": event.count,
            "recorded_at": event.recorded_at.to_rfc3339(),
        });

        self.request("POST", &self.table_url)
            .set("Prefer", "return=minimal")
            .send_json(body)
            .map_err(|e| StoreError::Request {
                endpoint: self.table_url.clone(),
                details: e.to_string(),
            })?;

        debug!("Inserted count {} into {}", event.count, self.table_url);
        Ok(())
    }

    fn select_last_blocking(&self) -> Result<Option<u64>, StoreError> {
        let url = format!("{}?select=count&order=id.desc&limit=1", self.table_url);

        let rows: Vec<CountRow> = self
            .request("GET", &url)
            .call()
            .map_err(|e| StoreError::Request {
                endpoint: url.clone(),
                details: e.to_string(),
            })?
            .into_json()
            .map_err(|e| StoreError::Decode {
                details: e.to_string(),
            })?;

        Ok(rows.first().map(|row| row.count))
    }
}

fn table_endpoint(base_url: &str, table: &str) -> String {
    format!("{}/rest/v1/{}", base_url.trim_end_matches('/'), table)
}

fn join_error(e: tokio::task::JoinError) -> StoreError {
    StoreError::Request {
        endpoint: "blocking pool".to_string(),
        details: e.to_string(),
    }
}

#[async_trait]
impl CountStore for RestCountStore {
    async fn append(&self, event: &CountEvent) -> Result<(), StoreError> {
        let store = self.clone();
        let event = *event;
        tokio::task::spawn_blocking(move || store.insert_blocking(&event))
            .await
            .map_err(join_error)?
    }

    async fn last_count(&self) -> Result<Option<u64>, StoreError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.select_last_blocking())
            .await
            .map_err(join_error)?
    }

    fn name(&self) -> &'static str {
        "rest"
    }
}
