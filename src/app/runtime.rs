use super::{RunSummary, SheetCounterApp, ShutdownReason};
use crate::counter::{run_frame_loop, LoopEnd};
use crate::error::{Result, SheetcountError};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

impl SheetCounterApp {
    /// Run the frame loop until end of stream or an interrupt, then shut down
    pub async fn run(&mut self) -> Result<RunSummary> {
        info!("Sheet counter is running");

        self.setup_signal_handlers();

        let source = self
            .source
            .as_deref_mut()
            .ok_or_else(|| SheetcountError::system("Frame source not open; call start() first"))?;
        let sink = self
            .sink
            .as_ref()
            .ok_or_else(|| SheetcountError::system("Event sink not started; call start() first"))?;

        let summary = run_frame_loop(
            source,
            self.detector.as_mut(),
            &mut self.state,
            sink,
            self.config.detector.confidence_threshold,
            &self.config.system,
            &self.cancellation_token,
        )
        .await;

        let reason = match summary.ended {
            LoopEnd::EndOfStream => ShutdownReason::EndOfStream,
            LoopEnd::Cancelled => self
                .signal_reason
                .lock()
                .take()
                .unwrap_or(ShutdownReason::Cancelled),
        };
        info!("Shutdown initiated: {:?}", reason);

        let run_summary = self.shutdown(reason, summary.frames_processed).await;

        info!(
            "Run complete: {} frames, {} sheets counted, total {}",
            run_summary.frames_processed, run_summary.sheets_counted, run_summary.final_total
        );
        Ok(run_summary)
    }

    /// Cancel the frame loop on SIGINT, and on SIGTERM where available
    fn setup_signal_handlers(&mut self) {
        #[cfg(unix)]
        {
            let token = self.cancellation_token.clone();
            let reason = Arc::clone(&self.signal_reason);
            self.signal_tasks.push(tokio::spawn(async move {
                let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        warn!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };
                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    reason
                        .lock()
                        .get_or_insert(ShutdownReason::Signal("SIGTERM".to_string()));
                    token.cancel();
                }
            }));
        }

        let token = self.cancellation_token.clone();
        let reason = Arc::clone(&self.signal_reason);
        self.signal_tasks.push(tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received SIGINT signal (Ctrl+C)");
                    reason
                        .lock()
                        .get_or_insert(ShutdownReason::Signal("SIGINT".to_string()));
                    token.cancel();
                }
                Err(e) => warn!("Failed to register SIGINT handler: {}", e),
            }
        }));
    }
}
