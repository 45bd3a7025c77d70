mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;


pub use orchestrator::SheetCounterApp;
pub use types::{ComponentState, RunSummary, ShutdownReason};
