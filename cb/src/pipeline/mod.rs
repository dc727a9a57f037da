//! Pipeline Orchestrator
//!
//! Drives one generation run through
//! `Idle -> PlanningInFlight -> BreakdownInFlight -> GeneratingFiles -> Done | Failed`.
//! Stage failures abort the run; per-file failures are recorded and isolated.

mod error;
mod orchestrator;
mod state;

pub use error::PipelineError;
pub use orchestrator::{Orchestrator, PipelineOptions, RunReport};
pub use state::RunState;
