//! Event types for pipeline activity streaming
//!
//! Each state transition of a run publishes the entity it produced: the
//! plan, the breakdown, every file outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Breakdown, FileOutcome};
use crate::pipeline::RunState;

/// Core event enum - the vocabulary of pipeline activity
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// A run has been accepted
    RunStarted { run_id: String, request: String },

    /// The orchestrator moved to a new state
    StateChanged { run_id: String, state: RunState },

    /// Human-readable progress line, already prefixed
    Status { run_id: String, line: String },

    /// The planner produced the plan
    PlanReady { run_id: String, plan: String },

    /// The architect produced a validated breakdown
    BreakdownReady { run_id: String, breakdown: Breakdown },

    /// One file finished (streaming mode)
    FileCompleted {
        run_id: String,
        index: usize,
        total: usize,
        outcome: FileOutcome,
    },

    /// All files at once (batch mode)
    FilesReady { run_id: String, outcomes: Vec<FileOutcome> },

    /// Something was dropped or overwritten
    Warning { run_id: String, message: String },

    /// The run reached Done or Failed
    RunFinished {
        run_id: String,
        success: bool,
        error: Option<String>,
    },
}

impl PipelineEvent {
    /// Get the run ID for this event
    pub fn run_id(&self) -> &str {
        match self {
            PipelineEvent::RunStarted { run_id, .. }
            | PipelineEvent::StateChanged { run_id, .. }
            | PipelineEvent::Status { run_id, .. }
            | PipelineEvent::PlanReady { run_id, .. }
            | PipelineEvent::BreakdownReady { run_id, .. }
            | PipelineEvent::FileCompleted { run_id, .. }
            | PipelineEvent::FilesReady { run_id, .. }
            | PipelineEvent::Warning { run_id, .. }
            | PipelineEvent::RunFinished { run_id, .. } => run_id,
        }
    }

    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            PipelineEvent::RunStarted { .. } => "RunStarted",
            PipelineEvent::StateChanged { .. } => "StateChanged",
            PipelineEvent::Status { .. } => "Status",
            PipelineEvent::PlanReady { .. } => "PlanReady",
            PipelineEvent::BreakdownReady { .. } => "BreakdownReady",
            PipelineEvent::FileCompleted { .. } => "FileCompleted",
            PipelineEvent::FilesReady { .. } => "FilesReady",
            PipelineEvent::Warning { .. } => "Warning",
            PipelineEvent::RunFinished { .. } => "RunFinished",
        }
    }
}

/// A timestamped event log entry for file persistence
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventLogEntry {
    /// Timestamp of the event
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    /// The event
    pub event: PipelineEvent,
}

impl EventLogEntry {
    /// Create a new log entry with current timestamp
    pub fn new(event: PipelineEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}
