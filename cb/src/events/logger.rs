//! Run Logger - persists pipeline events to JSONL files
//!
//! Subscribes to the EventBus and writes every event of a run to
//! `{runs_dir}/{run-id}/events.jsonl`, giving each run an audit trail with
//! its plan and breakdown.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyre::Context;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use super::bus::EventBus;
use super::types::{EventLogEntry, PipelineEvent};

/// Event logger that writes events to JSONL files
pub struct EventLogger {
    /// Base directory for run data
    runs_dir: PathBuf,
    /// Open file writers per run
    writers: HashMap<String, BufWriter<File>>,
}

impl EventLogger {
    /// Create a new event logger
    pub fn new(runs_dir: impl AsRef<Path>) -> Self {
        let runs_dir = runs_dir.as_ref().to_path_buf();
        debug!(?runs_dir, "EventLogger::new: creating logger");
        Self {
            runs_dir,
            writers: HashMap::new(),
        }
    }

    /// Logger under `<data_local_dir>/coderbuddy/runs`
    pub fn with_default_path() -> eyre::Result<Self> {
        let runs_dir = default_runs_dir()?;
        fs::create_dir_all(&runs_dir).context("Failed to create runs directory")?;
        Ok(Self::new(runs_dir))
    }

    /// Write an event to its run's log file
    pub fn write_event(&mut self, event: &PipelineEvent) -> eyre::Result<()> {
        let run_id = event.run_id().to_string();
        debug!(%run_id, event_type = event.event_type(), "EventLogger::write_event");

        if !self.writers.contains_key(&run_id) {
            let run_dir = self.runs_dir.join(&run_id);
            fs::create_dir_all(&run_dir)?;

            let log_path = run_dir.join("events.jsonl");
            debug!(?log_path, "EventLogger: creating new log file");

            let file = OpenOptions::new().create(true).append(true).open(&log_path)?;
            self.writers.insert(run_id.clone(), BufWriter::new(file));
        }

        let Some(writer) = self.writers.get_mut(&run_id) else {
            return Err(eyre::eyre!("No writer for run {}", run_id));
        };

        let entry = EventLogEntry::new(event.clone());
        let json = serde_json::to_string(&entry)?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;

        Ok(())
    }

    /// Close the writer for a finished run
    pub fn close_run(&mut self, run_id: &str) {
        debug!(%run_id, "EventLogger::close_run");
        if let Some(mut writer) = self.writers.remove(run_id) {
            let _ = writer.flush();
        }
    }

    /// Subscribe to `bus` and write its events on a background task
    ///
    /// The task ends once every sender of the bus is dropped; await the
    /// handle after that to be sure the tail of each run is on disk.
    pub fn spawn(self, bus: &EventBus) -> tokio::task::JoinHandle<()> {
        let rx = bus.subscribe();
        tokio::spawn(self.run(rx))
    }

    /// Consume events from the bus until it closes
    ///
    /// Meant to be spawned as a background task.
    pub async fn run(mut self, mut rx: broadcast::Receiver<PipelineEvent>) {
        debug!("EventLogger::run: starting event logger");

        loop {
            match rx.recv().await {
                Ok(event) => {
                    let run_id = event.run_id().to_string();
                    let finished = matches!(event, PipelineEvent::RunFinished { .. });

                    if let Err(e) = self.write_event(&event) {
                        error!(%run_id, error = %e, "EventLogger: failed to write event");
                    }

                    if finished {
                        self.close_run(&run_id);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(missed = n, "EventLogger: lagged behind, missed events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("EventLogger: channel closed, shutting down");
                    break;
                }
            }
        }

        for (run_id, mut writer) in self.writers.drain() {
            debug!(%run_id, "EventLogger: flushing writer on shutdown");
            let _ = writer.flush();
        }
    }
}

/// `<data_local_dir>/coderbuddy/runs`
pub fn default_runs_dir() -> eyre::Result<PathBuf> {
    let base = dirs::data_local_dir().ok_or_else(|| eyre::eyre!("Could not determine local data directory"))?;
    Ok(base.join("coderbuddy").join("runs"))
}

/// Read events from a run's log file
pub fn read_run_events(runs_dir: impl AsRef<Path>, run_id: &str) -> eyre::Result<Vec<EventLogEntry>> {
    let log_path = runs_dir.as_ref().join(run_id).join("events.jsonl");
    debug!(?log_path, "read_run_events: reading log file");

    if !log_path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(&log_path)?;
    let mut entries = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<EventLogEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                warn!(line, error = %e, "read_run_events: failed to parse line");
            }
        }
    }

    Ok(entries)
}

/// Spawn the event logger as a background task
///
/// Subscribes before returning so no event emitted afterwards is missed.
pub fn spawn_event_logger(event_bus: Arc<EventBus>) -> eyre::Result<tokio::task::JoinHandle<()>> {
    let logger = EventLogger::with_default_path()?;
    Ok(logger.spawn(&event_bus))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn started(run_id: &str) -> PipelineEvent {
        PipelineEvent::RunStarted {
            run_id: run_id.to_string(),
            request: "todo app".to_string(),
        }
    }

    #[test]
    fn test_write_and_read_events() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());

        logger.write_event(&started("run-1")).unwrap();
        logger
            .write_event(&PipelineEvent::PlanReady {
                run_id: "run-1".to_string(),
                plan: "plan text".to_string(),
            })
            .unwrap();

        let entries = read_run_events(temp.path(), "run-1").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event.event_type(), "RunStarted");
        assert_eq!(entries[1].event.event_type(), "PlanReady");
    }

    #[test]
    fn test_separate_files_per_run() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());

        logger.write_event(&started("run-a")).unwrap();
        logger.write_event(&started("run-b")).unwrap();

        assert!(temp.path().join("run-a").join("events.jsonl").exists());
        assert!(temp.path().join("run-b").join("events.jsonl").exists());
    }

    #[test]
    fn test_read_missing_run() {
        let temp = tempdir().unwrap();
        assert!(read_run_events(temp.path(), "nope").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_closes_writer_on_finish() {
        let temp = tempdir().unwrap();
        let bus = EventBus::new(16);
        let logger = EventLogger::new(temp.path());
        let handle = tokio::spawn(logger.run(bus.subscribe()));

        let emitter = bus.emitter_for("run-z");
        emitter.run_started("x");
        emitter.run_finished(true, None);
        drop(emitter);
        drop(bus);
        handle.await.unwrap();

        let entries = read_run_events(temp.path(), "run-z").unwrap();
        assert_eq!(entries.len(), 2);
    }
}
