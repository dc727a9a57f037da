//! Event Bus - pub/sub for pipeline events
//!
//! The EventBus uses tokio broadcast channels to deliver events to all
//! subscribers. The orchestrator emits; the console, disk writer and run
//! logger subscribe.

use tokio::sync::broadcast;
use tracing::debug;

use super::types::PipelineEvent;
use crate::domain::{Breakdown, FileOutcome};
use crate::pipeline::RunState;

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1_000;

/// Central event bus for pipeline activity
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    /// Create a new event bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Create a new event bus with default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit an event to all subscribers
    ///
    /// Fire-and-forget: with no subscribers the event is dropped.
    pub fn emit(&self, event: PipelineEvent) {
        debug!(event_type = event.event_type(), run_id = event.run_id(), "EventBus::emit");
        let _ = self.tx.send(event);
    }

    /// Subscribe to events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Create an emitter handle bound to one run
    pub fn emitter_for(&self, run_id: impl Into<String>) -> EventEmitter {
        let run_id = run_id.into();
        debug!(%run_id, "EventBus::emitter_for: creating emitter");
        EventEmitter {
            tx: self.tx.clone(),
            run_id,
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Handle for emitting events with a pre-set run ID
#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<PipelineEvent>,
    run_id: String,
}

impl EventEmitter {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Emit a raw event
    pub fn emit(&self, event: PipelineEvent) {
        debug!(event_type = event.event_type(), "EventEmitter::emit");
        let _ = self.tx.send(event);
    }

    // === Convenience methods ===

    pub fn run_started(&self, request: &str) {
        self.emit(PipelineEvent::RunStarted {
            run_id: self.run_id.clone(),
            request: request.to_string(),
        });
    }

    pub fn state_changed(&self, state: RunState) {
        self.emit(PipelineEvent::StateChanged {
            run_id: self.run_id.clone(),
            state,
        });
    }

    pub fn status(&self, line: impl Into<String>) {
        self.emit(PipelineEvent::Status {
            run_id: self.run_id.clone(),
            line: line.into(),
        });
    }

    pub fn plan_ready(&self, plan: &str) {
        self.emit(PipelineEvent::PlanReady {
            run_id: self.run_id.clone(),
            plan: plan.to_string(),
        });
    }

    pub fn breakdown_ready(&self, breakdown: &Breakdown) {
        self.emit(PipelineEvent::BreakdownReady {
            run_id: self.run_id.clone(),
            breakdown: breakdown.clone(),
        });
    }

    pub fn file_completed(&self, index: usize, total: usize, outcome: &FileOutcome) {
        self.emit(PipelineEvent::FileCompleted {
            run_id: self.run_id.clone(),
            index,
            total,
            outcome: outcome.clone(),
        });
    }

    pub fn files_ready(&self, outcomes: &[FileOutcome]) {
        self.emit(PipelineEvent::FilesReady {
            run_id: self.run_id.clone(),
            outcomes: outcomes.to_vec(),
        });
    }

    pub fn warning(&self, message: &str) {
        self.emit(PipelineEvent::Warning {
            run_id: self.run_id.clone(),
            message: message.to_string(),
        });
    }

    pub fn run_finished(&self, success: bool, error: Option<String>) {
        self.emit(PipelineEvent::RunFinished {
            run_id: self.run_id.clone(),
            success,
            error,
        });
    }
}
