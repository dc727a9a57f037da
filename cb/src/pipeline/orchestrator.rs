//! Orchestrator - sequences plan, breakdown and per-file generation

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{PipelineError, RunState};
use crate::agents::{AgentContext, Architect, Coder, FileGenerationError, Planner};
use crate::cancel::CancelFlag;
use crate::config::Config;
use crate::domain::{Breakdown, FileOutcome, GeneratedFile, ProjectPlan, ProjectRequest};
use crate::events::{EventBus, EventEmitter};
use crate::llm::{CompletionOptions, LlmClient};
use crate::prompts::PromptLoader;

/// Knobs for one orchestrator
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Emit each file as it completes instead of all at the end
    pub per_file_streaming: bool,
    /// Prepended to every status line
    pub response_prefix: String,
    /// Per-file calls allowed in flight
    pub concurrency: usize,
    /// Breakdown re-prompts after unparseable output
    pub repair_attempts: u32,
    /// Deadline for every LLM call
    pub deadline: Duration,
    pub completion: CompletionOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            per_file_streaming: true,
            response_prefix: String::new(),
            concurrency: 1,
            repair_attempts: 1,
            deadline: crate::agents::DEFAULT_DEADLINE,
            completion: CompletionOptions::default(),
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        let pipeline = &config.pipeline;
        Self {
            per_file_streaming: pipeline.per_file_streaming,
            response_prefix: pipeline.response_prefix.clone(),
            concurrency: pipeline.concurrency.max(1),
            repair_attempts: pipeline.repair_attempts,
            deadline: pipeline.deadline(),
            completion: CompletionOptions {
                system_prompt: None,
                max_tokens: config.llm.max_tokens,
                temperature: config.llm.temperature,
            },
        }
    }
}

/// Everything a finished run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub request: ProjectRequest,
    pub plan: ProjectPlan,
    pub breakdown: Breakdown,
    /// One entry per breakdown task, in order
    pub outcomes: Vec<FileOutcome>,
}

impl RunReport {
    /// Successfully generated files, in breakdown order
    pub fn generated_files(&self) -> Vec<GeneratedFile> {
        self.outcomes.iter().filter_map(FileOutcome::to_generated).collect()
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| !o.is_generated())
    }

    pub fn generated_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_generated()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.generated_count()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Runs the Plan -> Breakdown -> Files state machine
pub struct Orchestrator {
    planner: Planner,
    architect: Architect,
    coder: Coder,
    options: PipelineOptions,
    bus: Arc<EventBus>,
    cancel: CancelFlag,
    state: RunState,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>, options: PipelineOptions) -> Self {
        debug!(?options, "Orchestrator::new: called");
        let ctx = AgentContext::new(llm, prompts)
            .with_options(options.completion.clone())
            .with_deadline(options.deadline);

        Self {
            planner: Planner::new(ctx.clone()),
            architect: Architect::new(ctx.clone()).with_repair_attempts(options.repair_attempts),
            coder: Coder::new(ctx).with_concurrency(options.concurrency),
            options,
            bus: Arc::new(EventBus::with_default_capacity()),
            cancel: CancelFlag::new(),
            state: RunState::Idle,
        }
    }

    /// Publish on a shared bus instead of a private one
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = bus;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run the whole pipeline for one request
    pub async fn run(&mut self, request: ProjectRequest) -> Result<RunReport, PipelineError> {
        let run_id = Uuid::now_v7().to_string();
        info!(%run_id, "Starting generation run");
        let emitter = self.bus.emitter_for(&run_id);
        emitter.run_started(request.as_str());

        let result = self.drive(request, &run_id, &emitter).await;

        match &result {
            Ok(report) => {
                self.transition(RunState::Done, &emitter);
                self.status(
                    &emitter,
                    format!(
                        "Done: {} generated, {} failed",
                        report.generated_count(),
                        report.failed_count()
                    ),
                );
                emitter.run_finished(true, None);
            }
            Err(e) => {
                warn!(%run_id, error = %e, "Run failed");
                self.transition(RunState::Failed, &emitter);
                emitter.run_finished(false, Some(e.to_string()));
            }
        }
        result
    }

    async fn drive(
        &mut self,
        request: ProjectRequest,
        run_id: &str,
        emitter: &EventEmitter,
    ) -> Result<RunReport, PipelineError> {
        debug!(%run_id, "Orchestrator::drive: called");

        self.check_cancelled(RunState::PlanningInFlight)?;
        self.transition(RunState::PlanningInFlight, emitter);
        self.status(emitter, "Planning the project...");
        let plan = self
            .planner
            .plan(&request)
            .await
            .map_err(PipelineError::PlanningFailed)?;
        emitter.plan_ready(plan.as_str());

        self.check_cancelled(RunState::BreakdownInFlight)?;
        self.transition(RunState::BreakdownInFlight, emitter);
        self.status(emitter, "Breaking the plan into files...");
        let breakdown = self
            .architect
            .design(&plan)
            .await
            .map_err(PipelineError::BreakdownFailed)?;
        for warning in breakdown.warnings() {
            emitter.warning(warning);
        }
        emitter.breakdown_ready(&breakdown);

        self.check_cancelled(RunState::GeneratingFiles)?;
        self.transition(RunState::GeneratingFiles, emitter);
        self.status(emitter, format!("Generating {} files...", breakdown.len()));
        let (outcomes, cancelled) = self.generate(&breakdown, &plan, emitter).await;

        let report = RunReport {
            run_id: run_id.to_string(),
            request,
            plan,
            breakdown,
            outcomes,
        };
        if cancelled {
            info!(generated = report.generated_count(), "Run cancelled during file generation");
            return Err(PipelineError::Cancelled {
                before: RunState::Done,
                partial: Some(Box::new(report)),
            });
        }
        Ok(report)
    }

    /// Outcomes in breakdown order, and whether generation stopped on cancel
    ///
    /// Files finished before the stop are kept.
    async fn generate(&self, breakdown: &Breakdown, plan: &ProjectPlan, emitter: &EventEmitter) -> (Vec<FileOutcome>, bool) {
        let total = breakdown.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut stream = std::pin::pin!(self.coder.implement_stream(breakdown, plan, &self.cancel));

        while let Some(result) = stream.next().await {
            if let Err(e) = &result
                && e.is_cancelled()
            {
                debug!(filename = %e.filename(), "Orchestrator::generate: cancelled");
                if !self.options.per_file_streaming {
                    emitter.files_ready(&outcomes);
                }
                return (outcomes, true);
            }

            let outcome = FileGenerationError::outcome(result);
            let index = outcomes.len();
            if self.options.per_file_streaming {
                emitter.file_completed(index, total, &outcome);
                match outcome.failure() {
                    None => self.status(emitter, format!("[{}/{}] {}", index + 1, total, outcome.filename)),
                    Some(reason) => self.status(
                        emitter,
                        format!("[{}/{}] {} failed: {}", index + 1, total, outcome.filename, reason),
                    ),
                }
            }
            outcomes.push(outcome);
        }

        if !self.options.per_file_streaming {
            emitter.files_ready(&outcomes);
        }
        (outcomes, false)
    }

    fn check_cancelled(&self, before: RunState) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            info!(%before, "Run cancelled");
            return Err(PipelineError::Cancelled { before, partial: None });
        }
        Ok(())
    }

    fn transition(&mut self, next: RunState, emitter: &EventEmitter) {
        debug!(from = %self.state, to = %next, "Orchestrator::transition: called");
        self.state = next;
        emitter.state_changed(next);
    }

    fn status(&self, emitter: &EventEmitter, line: impl AsRef<str>) {
        let line = format!("{}{}", self.options.response_prefix, line.as_ref());
        info!("{}", line);
        emitter.status(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PipelineEvent;
    use crate::llm::{CompletionRequest, CompletionResponse, LlmError, MockLlmClient, MockReply};
    use async_trait::async_trait;

    const BREAKDOWN: &str = r#"[{"filename": "index.html", "task": "page"}, {"filename": "app.js", "task": "logic"}]"#;

    fn orchestrator(llm: Arc<dyn LlmClient>, options: PipelineOptions) -> Orchestrator {
        Orchestrator::new(llm, Arc::new(PromptLoader::embedded_only()), options)
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_happy_path_reaches_done() {
        let llm = Arc::new(MockLlmClient::with_texts(["the plan", BREAKDOWN, "<html></html>", "let x = 1;"]));
        let mut orch = orchestrator(llm.clone(), PipelineOptions::default());
        let mut rx = orch.event_bus().subscribe();

        let report = orch.run(ProjectRequest::new("todo")).await.unwrap();

        assert_eq!(orch.state(), RunState::Done);
        assert_eq!(report.plan.as_str(), "the plan");
        assert_eq!(report.generated_count(), 2);
        assert_eq!(llm.call_count(), 4);

        let states: Vec<RunState> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                PipelineEvent::StateChanged { state, .. } => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                RunState::PlanningInFlight,
                RunState::BreakdownInFlight,
                RunState::GeneratingFiles,
                RunState::Done
            ]
        );
    }

    #[tokio::test]
    async fn test_rate_limit_during_planning_stops_run() {
        let llm = Arc::new(MockLlmClient::new(vec![MockReply::rate_limited()]));
        let mut orch = orchestrator(llm.clone(), PipelineOptions::default());

        let err = orch.run(ProjectRequest::new("todo")).await.unwrap_err();

        assert!(matches!(err, PipelineError::PlanningFailed(_)));
        assert!(err.is_rate_limit());
        assert_eq!(orch.state(), RunState::Failed);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_breakdown_failure_carries_raw() {
        let llm = Arc::new(MockLlmClient::with_texts(["plan", "no json", "still no json"]));
        let mut orch = orchestrator(llm.clone(), PipelineOptions::default());

        let err = orch.run(ProjectRequest::new("todo")).await.unwrap_err();

        assert!(matches!(err, PipelineError::BreakdownFailed(_)));
        assert_eq!(err.raw(), Some("still no json"));
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test]
    async fn test_file_failure_is_isolated() {
        let llm = Arc::new(MockLlmClient::new(vec![
            MockReply::text("plan"),
            MockReply::text(BREAKDOWN),
            MockReply::server_error("overloaded"),
            MockReply::text("let x = 1;"),
        ]));
        let mut orch = orchestrator(llm, PipelineOptions::default());

        let report = orch.run(ProjectRequest::new("todo")).await.unwrap();

        assert_eq!(orch.state(), RunState::Done);
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.failed().next().map(|o| o.filename.as_str()), Some("index.html"));
        assert_eq!(report.generated_files()[0].filename, "app.js");
    }

    #[tokio::test]
    async fn test_batch_mode_emits_files_once() {
        let llm = Arc::new(MockLlmClient::with_texts(["plan", BREAKDOWN, "a", "b"]));
        let options = PipelineOptions {
            per_file_streaming: false,
            response_prefix: "⚡ ".to_string(),
            ..PipelineOptions::default()
        };
        let mut orch = orchestrator(llm, options);
        let mut rx = orch.event_bus().subscribe();

        orch.run(ProjectRequest::new("todo")).await.unwrap();

        let events = drain(&mut rx);
        assert!(!events.iter().any(|e| matches!(e, PipelineEvent::FileCompleted { .. })));
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, PipelineEvent::FilesReady { .. }))
                .count(),
            1
        );
        assert!(
            events
                .iter()
                .filter_map(|e| match e {
                    PipelineEvent::Status { line, .. } => Some(line),
                    _ => None,
                })
                .all(|line| line.starts_with("⚡ "))
        );
    }

    #[tokio::test]
    async fn test_cancel_before_start_makes_no_calls() {
        let llm = Arc::new(MockLlmClient::with_texts(["plan"]));
        let mut orch = orchestrator(llm.clone(), PipelineOptions::default());
        orch.cancel_flag().cancel();

        let err = orch.run(ProjectRequest::new("todo")).await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Cancelled {
                before: RunState::PlanningInFlight,
                partial: None
            }
        ));
        assert_eq!(llm.call_count(), 0);
    }

    /// Cancels the run while answering its `nth` call (1-based)
    struct CancelOnCall {
        inner: MockLlmClient,
        cancel: CancelFlag,
        nth: usize,
    }

    #[async_trait]
    impl LlmClient for CancelOnCall {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            if self.inner.call_count() + 1 == self.nth {
                self.cancel.cancel();
            }
            self.inner.complete(request).await
        }
    }

    #[tokio::test]
    async fn test_cancel_mid_run_lets_call_finish_then_stops() {
        let cancel = CancelFlag::new();
        let llm = Arc::new(CancelOnCall {
            inner: MockLlmClient::with_texts(["plan", BREAKDOWN]),
            cancel: cancel.clone(),
            nth: 1,
        });
        let mut orch = orchestrator(llm.clone(), PipelineOptions::default()).with_cancel_flag(cancel);

        let err = orch.run(ProjectRequest::new("todo")).await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Cancelled {
                before: RunState::BreakdownInFlight,
                partial: None
            }
        ));
        assert_eq!(llm.inner.call_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_files_keeps_finished_ones() {
        let cancel = CancelFlag::new();
        let llm = Arc::new(CancelOnCall {
            inner: MockLlmClient::with_texts(["plan", BREAKDOWN, "<html></html>", "let x = 1;"]),
            cancel: cancel.clone(),
            nth: 3,
        });
        let mut orch = orchestrator(llm.clone(), PipelineOptions::default()).with_cancel_flag(cancel);

        let err = orch.run(ProjectRequest::new("todo")).await.unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(orch.state(), RunState::Failed);
        assert_eq!(llm.inner.call_count(), 3);

        let partial = err.partial().unwrap();
        assert_eq!(partial.outcomes.len(), 1);
        let files = partial.generated_files();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "index.html");
        assert_eq!(files[0].content, "<html></html>");
    }
}
