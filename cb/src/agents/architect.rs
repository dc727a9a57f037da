//! Architect - project plan to validated Breakdown
//!
//! The model is asked for a JSON array of {filename, task} objects. Output
//! goes through the sanitizer; when that fails the model gets the parser
//! diagnostic and its previous answer and may try again.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{AgentContext, AgentError};
use crate::domain::{Breakdown, FileTask, ProjectPlan};
use crate::prompts::{BreakdownContext, RepairContext};
use crate::sanitize::{self, SanitizeError};

/// Default number of repair re-prompts
pub const DEFAULT_REPAIR_ATTEMPTS: u32 = 1;

/// Breakdown stage failures
#[derive(Debug, Error)]
pub enum BreakdownError {
    #[error("Breakdown request failed: {0}")]
    Agent(#[from] AgentError),

    #[error("{cause}")]
    Unparseable {
        #[source]
        cause: SanitizeError,
        raw: String,
    },

    #[error("Breakdown contained no usable entries ({} warnings)", .warnings.len())]
    EmptyBreakdown { raw: String, warnings: Vec<String> },
}

impl BreakdownError {
    /// Raw model text behind the failure, when there was one
    pub fn raw(&self) -> Option<&str> {
        match self {
            BreakdownError::Agent(_) => None,
            BreakdownError::Unparseable { raw, .. } => Some(raw),
            BreakdownError::EmptyBreakdown { raw, .. } => Some(raw),
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, BreakdownError::Agent(e) if e.is_rate_limit())
    }
}

/// Turns a plan into the list of files to generate
pub struct Architect {
    ctx: AgentContext,
    repair_attempts: u32,
}

impl Architect {
    pub fn new(ctx: AgentContext) -> Self {
        Self {
            ctx,
            repair_attempts: DEFAULT_REPAIR_ATTEMPTS,
        }
    }

    pub fn with_repair_attempts(mut self, attempts: u32) -> Self {
        self.repair_attempts = attempts;
        self
    }

    /// Ask for the breakdown, repairing unparseable output if allowed
    pub async fn design(&self, plan: &ProjectPlan) -> Result<Breakdown, BreakdownError> {
        debug!(plan_len = plan.as_str().len(), repair_attempts = %self.repair_attempts, "Architect::design: called");
        let mut raw = self.ctx.ask("breakdown", &BreakdownContext { plan: plan.as_str() }).await?;
        let mut repairs = 0;

        loop {
            match sanitize::sanitize(&raw) {
                Ok(objects) => return build_breakdown(objects, raw),
                Err(cause) if repairs < self.repair_attempts => {
                    repairs += 1;
                    warn!(%cause, attempt = repairs, "Breakdown output unparseable, re-prompting");
                    let diagnostic = cause.to_string();
                    raw = self
                        .ctx
                        .ask("breakdown-repair", &RepairContext {
                            plan: plan.as_str(),
                            diagnostic: &diagnostic,
                            previous_output: &raw,
                        })
                        .await?;
                }
                Err(cause) => {
                    debug!(%cause, "Architect::design: giving up");
                    return Err(BreakdownError::Unparseable { cause, raw });
                }
            }
        }
    }
}

/// Validate sanitized objects into a Breakdown, dropping bad entries
fn build_breakdown(objects: Vec<Map<String, Value>>, raw: String) -> Result<Breakdown, BreakdownError> {
    debug!(entry_count = objects.len(), "build_breakdown: called");
    let mut breakdown = Breakdown::new();

    for (idx, object) in objects.iter().enumerate() {
        let filename = object.get("filename").and_then(Value::as_str);
        let task = object.get("task").and_then(Value::as_str);

        match (filename, task) {
            (Some(filename), Some(task)) => match FileTask::new(filename, task) {
                Ok(file_task) => breakdown.push(file_task),
                Err(e) => breakdown.warn(format!("entry {} dropped: {}", idx, e)),
            },
            (None, _) => breakdown.warn(format!("entry {} dropped: missing string field \"filename\"", idx)),
            (_, None) => breakdown.warn(format!("entry {} dropped: missing string field \"task\"", idx)),
        }
    }

    if breakdown.is_empty() {
        return Err(BreakdownError::EmptyBreakdown {
            raw,
            warnings: breakdown.warnings().to_vec(),
        });
    }

    info!(
        file_count = breakdown.len(),
        warning_count = breakdown.warnings().len(),
        "Breakdown validated"
    );
    Ok(breakdown)
}
