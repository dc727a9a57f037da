//! Coder - one generation call per breakdown entry
//!
//! Results always come back in breakdown order, one per entry. A failed call
//! becomes a failed outcome in its slot; siblings are unaffected.

use futures::stream::{self, Stream, StreamExt};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{AgentContext, AgentError};
use crate::cancel::CancelFlag;
use crate::domain::{Breakdown, FileOutcome, FileTask, GeneratedFile, ProjectPlan};
use crate::llm::LlmError;
use crate::prompts::FileContext;
use crate::sanitize;

/// Failure scoped to a single file
#[derive(Debug, Error)]
pub enum FileGenerationError {
    #[error("generation of {filename} failed: {cause}")]
    Failed {
        filename: String,
        #[source]
        cause: AgentError,
    },

    #[error("cancelled before generating {filename}")]
    Cancelled { filename: String },
}

impl FileGenerationError {
    pub fn filename(&self) -> &str {
        match self {
            FileGenerationError::Failed { filename, .. } => filename,
            FileGenerationError::Cancelled { filename } => filename,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FileGenerationError::Cancelled { .. })
    }

    /// Convert a per-file result into its report entry
    pub fn outcome(result: Result<GeneratedFile, FileGenerationError>) -> FileOutcome {
        match result {
            Ok(file) => FileOutcome::generated(file.filename, file.content),
            Err(FileGenerationError::Failed { filename, cause }) => FileOutcome::failed(filename, cause.user_message()),
            Err(e @ FileGenerationError::Cancelled { .. }) => FileOutcome::failed(e.filename().to_string(), e.to_string()),
        }
    }
}

/// Writes each file from its task description plus the full plan
pub struct Coder {
    ctx: AgentContext,
    concurrency: usize,
}

impl Coder {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx, concurrency: 1 }
    }

    /// Allow up to `limit` calls in flight (minimum 1)
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    /// Generate every file and return one outcome per task, in task order
    pub async fn implement(&self, breakdown: &Breakdown, plan: &ProjectPlan) -> Vec<FileOutcome> {
        debug!(file_count = breakdown.len(), concurrency = %self.concurrency, "Coder::implement: called");
        let cancel = CancelFlag::new();
        let outcomes: Vec<FileOutcome> = self
            .implement_stream(breakdown, plan, &cancel)
            .map(FileGenerationError::outcome)
            .collect()
            .await;

        let failed = outcomes.iter().filter(|o| !o.is_generated()).count();
        info!(generated = outcomes.len() - failed, %failed, "File generation finished");
        outcomes
    }

    /// Per-file results as they complete, still in task order
    ///
    /// The cancel flag is checked before each call starts.
    pub fn implement_stream<'a>(
        &'a self,
        breakdown: &'a Breakdown,
        plan: &'a ProjectPlan,
        cancel: &'a CancelFlag,
    ) -> impl Stream<Item = Result<GeneratedFile, FileGenerationError>> + 'a {
        stream::iter(breakdown.tasks())
            .map(move |task| async move {
                if cancel.is_cancelled() {
                    debug!(filename = %task.filename, "Coder::implement_stream: cancelled");
                    return Err(FileGenerationError::Cancelled {
                        filename: task.filename.clone(),
                    });
                }
                self.implement_file(task, plan).await
            })
            .buffered(self.concurrency)
    }

    /// One call for one file; an enclosing code fence is removed
    pub async fn implement_file(&self, task: &FileTask, plan: &ProjectPlan) -> Result<GeneratedFile, FileGenerationError> {
        debug!(filename = %task.filename, "Coder::implement_file: called");
        let failed = |cause: AgentError| FileGenerationError::Failed {
            filename: task.filename.clone(),
            cause,
        };

        let text = self
            .ctx
            .ask("file", &FileContext {
                filename: &task.filename,
                task: &task.task,
                plan: plan.as_str(),
            })
            .await
            .map_err(|e| {
                warn!(filename = %task.filename, error = %e, "File generation failed");
                failed(e)
            })?;

        let content = sanitize::strip_enclosing_fence(&text);
        if content.trim().is_empty() {
            warn!(filename = %task.filename, "Model returned an empty code block");
            return Err(failed(AgentError::Llm(LlmError::InvalidResponse(
                "model returned an empty code block".to_string(),
            ))));
        }

        Ok(GeneratedFile::new(task.filename.clone(), content))
    }
}
