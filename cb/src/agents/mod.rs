//! The three generation agents
//!
//! - [`Planner`]: request -> free-text plan
//! - [`Architect`]: plan -> validated [`Breakdown`](crate::domain::Breakdown)
//! - [`Coder`]: one file per breakdown entry
//!
//! Each agent renders one prompt template and makes one deadline-bounded
//! call through [`AgentContext`].

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::llm::{self, CompletionOptions, LlmClient, LlmError};
use crate::prompts::PromptLoader;

mod architect;
mod coder;
mod planner;

pub use architect::{Architect, BreakdownError};
pub use coder::{Coder, FileGenerationError};
pub use planner::Planner;

/// Default deadline for a single agent call
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(180);

/// Failure of a single agent call
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Prompt error: {0}")]
    Prompt(String),
}

impl AgentError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, AgentError::Llm(e) if e.is_rate_limit())
    }

    pub fn llm_error(&self) -> Option<&LlmError> {
        match self {
            AgentError::Llm(e) => Some(e),
            AgentError::Prompt(_) => None,
        }
    }

    /// Message suitable for showing to an end user
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Llm(e) => e.user_message(),
            AgentError::Prompt(msg) => format!("Unexpected error: {}", msg),
        }
    }
}

/// What every agent needs to make a call
#[derive(Clone)]
pub struct AgentContext {
    pub llm: Arc<dyn LlmClient>,
    pub prompts: Arc<PromptLoader>,
    pub options: CompletionOptions,
    pub deadline: Duration,
}

impl AgentContext {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>) -> Self {
        Self {
            llm,
            prompts,
            options: CompletionOptions::default(),
            deadline: DEFAULT_DEADLINE,
        }
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Render `template` and complete it
    pub(crate) async fn ask<T: Serialize>(&self, template: &str, context: &T) -> Result<String, AgentError> {
        debug!(%template, "AgentContext::ask: called");
        let prompt = self
            .prompts
            .render(template, context)
            .map_err(|e| AgentError::Prompt(e.to_string()))?;
        let text = llm::complete_text(self.llm.as_ref(), &prompt, &self.options, self.deadline).await?;
        Ok(text)
    }
}
