use super::{ComponentState, RunSummary, SheetCounterApp, ShutdownReason};
use crate::sink::SinkStatsSnapshot;
use std::time::Duration;
use tracing::info;

impl SheetCounterApp {
    /// Release the frame source and give queued events a bounded chance to persist
    pub async fn shutdown(&mut self, reason: ShutdownReason, frames_processed: u64) -> RunSummary {
        info!("Beginning graceful shutdown");

        self.cancellation_token.cancel();
        for task in self.signal_tasks.drain(..) {
            task.abort();
        }

        let mut frames_dropped = 0;
        if let Some(mut source) = self.source.take() {
            self.set_component_state("source", ComponentState::Stopping)
                .await;
            frames_dropped = source.dropped_frames();
            source.release().await;
            self.set_component_state("source", ComponentState::Stopped)
                .await;
        }

        let mut sink_stats = SinkStatsSnapshot::default();
        if let Some(mut sink) = self.sink.take() {
            self.set_component_state("sink", ComponentState::Stopping)
                .await;
            let drain_timeout = Duration::from_millis(self.config.persistence.drain_timeout_ms);
            sink_stats = sink.shutdown(drain_timeout).await;
            self.set_component_state("sink", ComponentState::Stopped)
                .await;
        }

        self.set_component_state("store", ComponentState::Stopped)
            .await;

        info!("Graceful shutdown completed");
        RunSummary {
            frames_processed,
            frames_dropped,
            sheets_counted: self.state.counted_this_run(),
            final_total: self.state.total(),
            sink: sink_stats,
            reason,
        }
    }
}
