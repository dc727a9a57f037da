//! Pipeline error taxonomy

use thiserror::Error;

use super::{RunReport, RunState};
use crate::agents::{AgentError, BreakdownError};

/// Why a run ended in `Failed`
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Planning failed: {0}")]
    PlanningFailed(#[source] AgentError),

    #[error("Breakdown failed: {0}")]
    BreakdownFailed(#[source] BreakdownError),

    /// `partial` holds the files finished before the stop, when any stage got that far
    #[error("Run cancelled before {before}")]
    Cancelled {
        before: RunState,
        partial: Option<Box<RunReport>>,
    },
}

impl PipelineError {
    /// Offending model text, for stage failures that had one
    pub fn raw(&self) -> Option<&str> {
        match self {
            PipelineError::BreakdownFailed(e) => e.raw(),
            _ => None,
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        match self {
            PipelineError::PlanningFailed(e) => e.is_rate_limit(),
            PipelineError::BreakdownFailed(e) => e.is_rate_limit(),
            PipelineError::Cancelled { .. } => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled { .. })
    }

    /// Report of the work completed before a cancellation
    pub fn partial(&self) -> Option<&RunReport> {
        match self {
            PipelineError::Cancelled { partial, .. } => partial.as_deref(),
            _ => None,
        }
    }

    /// Message suitable for showing to an end user
    pub fn user_message(&self) -> String {
        if self.is_rate_limit() {
            return "API rate limit reached. Try again later.".to_string();
        }
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use crate::sanitize::SanitizeError;
    use std::time::Duration;

    #[test]
    fn test_rate_limit_message() {
        let err = PipelineError::PlanningFailed(AgentError::Llm(LlmError::RateLimited {
            retry_after: Duration::from_secs(5),
        }));
        assert!(err.is_rate_limit());
        assert_eq!(err.user_message(), "API rate limit reached. Try again later.");
    }

    #[test]
    fn test_breakdown_failure_exposes_raw() {
        let err = PipelineError::BreakdownFailed(BreakdownError::Unparseable {
            cause: SanitizeError::NoStructuredOutput,
            raw: "just prose".to_string(),
        });
        assert_eq!(err.raw(), Some("just prose"));
        assert!(err.to_string().contains("No JSON array found"));
    }
}
