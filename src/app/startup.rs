use super::{ComponentState, SheetCounterApp};
use crate::error::Result;
use crate::sink::EventSink;
use crate::source::open_source;
use std::sync::Arc;
use tracing::{error, info, warn};

impl SheetCounterApp {
    /// Seed the ledger, open the frame source and start the persistence worker
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting sheet counter");

        self.seed_ledger().await?;

        self.set_component_state("source", ComponentState::Starting)
            .await;
        let source = match open_source(&self.config.stream).await {
            Ok(source) => source,
            Err(e) => {
                self.set_component_state("source", ComponentState::Failed)
                    .await;
                error!("Failed to open frame source '{}': {}", self.config.stream.source, e);
                return Err(e);
            }
        };
        self.source = Some(source);
        self.set_component_state("source", ComponentState::Running)
            .await;

        self.set_component_state("sink", ComponentState::Starting)
            .await;
        self.sink = Some(EventSink::start(
            Arc::clone(&self.store),
            self.config.persistence.queue_capacity,
        ));
        self.set_component_state("sink", ComponentState::Running)
            .await;

        info!(
            "Sheet counter started (line y={}, lane x={}..={}, total {})",
            self.config.counting.line_y,
            self.config.counting.lane_x_min,
            self.config.counting.lane_x_max,
            self.state.total()
        );
        Ok(())
    }

    /// A failed read leaves the run starting from zero
    async fn seed_ledger(&mut self) -> Result<()> {
        self.set_component_state("store", ComponentState::Starting)
            .await;

        let initial = match self.store.last_count().await {
            Ok(Some(count)) => {
                info!("Resuming from persisted count {}", count);
                count
            }
            Ok(None) => {
                info!("No persisted count found, starting from 0");
                0
            }
            Err(e) => {
                warn!(
                    "Could not read last count from {} store, starting from 0: {}",
                    self.store.name(),
                    e
                );
                0
            }
        };

        self.state.seed(initial)?;
        self.set_component_state("store", ComponentState::Running)
            .await;
        Ok(())
    }
}
