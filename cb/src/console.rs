//! Console rendering of pipeline events

use std::sync::Arc;

use colored::Colorize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::domain::{FileOutcome, FileStatus};
use crate::events::{EventBus, PipelineEvent};

/// One printable line per event; `None` for events with nothing to show
pub fn render_event(event: &PipelineEvent) -> Option<String> {
    match event {
        PipelineEvent::Status { line, .. } => Some(format!("{} {}", "›".cyan(), line)),
        PipelineEvent::PlanReady { plan, .. } => {
            Some(format!("{}\n{}\n", "Plan".bright_cyan().bold(), plan.trim()))
        }
        PipelineEvent::BreakdownReady { breakdown, .. } => {
            let mut out = format!("{} ({} files)", "Breakdown".bright_cyan().bold(), breakdown.len());
            for task in breakdown.tasks() {
                out.push_str(&format!("\n  {} {}", "•".dimmed(), task.filename));
            }
            Some(out)
        }
        PipelineEvent::FileCompleted {
            index, total, outcome, ..
        } => Some(format!("[{}/{}] {}", index + 1, total, render_outcome(outcome))),
        PipelineEvent::FilesReady { outcomes, .. } => Some(
            outcomes
                .iter()
                .map(render_outcome)
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        PipelineEvent::Warning { message, .. } => Some(format!("{} {}", "⚠".yellow(), message)),
        PipelineEvent::RunFinished {
            success: false,
            error: Some(error),
            ..
        } => Some(format!("{} {}", "✗".red(), error)),
        PipelineEvent::RunStarted { .. } | PipelineEvent::StateChanged { .. } | PipelineEvent::RunFinished { .. } => {
            None
        }
    }
}

fn render_outcome(outcome: &FileOutcome) -> String {
    match &outcome.status {
        FileStatus::Generated { content } => {
            format!("{} {} ({} bytes)", "✓".green(), outcome.filename, content.len())
        }
        FileStatus::Failed { reason } => format!("{} {}: {}", "✗".red(), outcome.filename, reason),
    }
}

/// Print every event on the bus until the run finishes
///
/// Subscribes before returning so no event emitted afterwards is missed.
pub fn spawn_console_printer(bus: Arc<EventBus>) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let finished = matches!(event, PipelineEvent::RunFinished { .. });
                    if let Some(line) = render_event(&event) {
                        println!("{}", line);
                    }
                    if finished {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "spawn_console_printer: lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
