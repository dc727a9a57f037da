//! Run states

use serde::{Deserialize, Serialize};

/// Where a run is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    PlanningInFlight,
    BreakdownInFlight,
    GeneratingFiles,
    Done,
    Failed,
}

impl RunState {
    /// Done or Failed
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::PlanningInFlight => write!(f, "planning"),
            Self::BreakdownInFlight => write!(f, "breaking down"),
            Self::GeneratingFiles => write!(f, "generating files"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
