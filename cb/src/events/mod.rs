//! Event Bus for pipeline observability
//!
//! Every state transition of a run emits an event carrying what the stage
//! produced. Consumers (console progress, run logger) subscribe to the bus.
//!
//! ```text
//!   Orchestrator ──emit──▶ EventBus (tokio broadcast) ──▶ console
//!                                                   └──▶ events.jsonl
//! ```

mod bus;
mod logger;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventEmitter};
pub use logger::{EventLogger, default_runs_dir, read_run_events, spawn_event_logger};
pub use types::{EventLogEntry, PipelineEvent};
