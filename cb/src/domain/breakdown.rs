//! FileTask and Breakdown
//!
//! A Breakdown is the validated, ordered list of files the coder will
//! generate. Filenames are unique and never escape the project root.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Reasons a (filename, task) pair is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileTaskError {
    #[error("filename is empty")]
    EmptyFilename,

    #[error("task for {filename} is empty")]
    EmptyTask { filename: String },

    #[error("unsafe path {filename}: {reason}")]
    UnsafePath { filename: String, reason: String },
}

/// Check that a filename is a relative path that stays under its root
///
/// Rejects absolute paths, root or drive prefixes, and any `..` segment.
/// Backslashes count as separators so Windows-style traversal is caught too.
pub fn validate_relative_path(filename: &str) -> Result<PathBuf, FileTaskError> {
    debug!(%filename, "validate_relative_path: called");
    let unsafe_path = |reason: &str| FileTaskError::UnsafePath {
        filename: filename.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = filename.trim();
    if trimmed.is_empty() {
        return Err(FileTaskError::EmptyFilename);
    }
    if trimmed.starts_with('/') || trimmed.starts_with('\\') {
        return Err(unsafe_path("absolute path"));
    }
    let bytes = trimmed.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return Err(unsafe_path("drive prefix"));
    }
    if trimmed.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(unsafe_path("parent directory segment"));
    }

    let normalized = trimmed.replace('\\', "/");
    let mut path = PathBuf::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir => return Err(unsafe_path("parent directory segment")),
            Component::RootDir | Component::Prefix(_) => return Err(unsafe_path("absolute path")),
        }
    }

    if path.as_os_str().is_empty() {
        debug!("validate_relative_path: no file component");
        return Err(unsafe_path("no file name"));
    }
    Ok(path)
}

/// `/`-joined form of a validated path, one spelling per file
fn normalized_name(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// One file to generate: where it goes and what it is for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTask {
    pub filename: String,
    pub task: String,
}

impl FileTask {
    /// Build a validated task
    pub fn new(filename: impl Into<String>, task: impl Into<String>) -> Result<Self, FileTaskError> {
        let filename = filename.into();
        let task = task.into();
        debug!(%filename, "FileTask::new: called");

        let path = validate_relative_path(&filename)?;
        if task.trim().is_empty() {
            return Err(FileTaskError::EmptyTask { filename });
        }

        Ok(Self {
            filename: normalized_name(&path),
            task: task.trim().to_string(),
        })
    }
}

/// Validated ordered list of file tasks plus the warnings raised building it
///
/// Kept on the run report as an audit artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakdown {
    tasks: Vec<FileTask>,
    warnings: Vec<String>,
}

impl Breakdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task
    ///
    /// A repeated filename replaces the earlier task at the earlier
    /// position and records a warning.
    pub fn push(&mut self, task: FileTask) {
        debug!(filename = %task.filename, "Breakdown::push: called");
        match self.tasks.iter_mut().find(|t| t.filename == task.filename) {
            Some(existing) => {
                let message = format!("duplicate filename {}: later entry overwrites earlier one", task.filename);
                warn!("{}", message);
                *existing = task;
                self.warnings.push(message);
            }
            None => self.tasks.push(task),
        }
    }

    /// Record a warning without touching the task list
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn tasks(&self) -> &[FileTask] {
        &self.tasks
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn filenames(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.filename.as_str()).collect()
    }

    /// Pretty JSON for the audit trail
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl FromIterator<FileTask> for Breakdown {
    fn from_iter<I: IntoIterator<Item = FileTask>>(iter: I) -> Self {
        let mut breakdown = Breakdown::new();
        for task in iter {
            breakdown.push(task);
        }
        breakdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_paths_accepted() {
        assert_eq!(validate_relative_path("index.html").unwrap(), PathBuf::from("index.html"));
        assert_eq!(validate_relative_path("src/app.js").unwrap(), PathBuf::from("src/app.js"));
        assert_eq!(validate_relative_path("./css/style.css").unwrap(), PathBuf::from("css/style.css"));
        assert_eq!(validate_relative_path("assets\\logo.png").unwrap(), PathBuf::from("assets/logo.png"));
    }

    #[test]
    fn test_traversal_rejected() {
        for bad in ["../etc/passwd", "a/../../b", "..", "a\\..\\b", "/etc/passwd", "\\\\server\\share", "C:\\win.ini", "c:/x"] {
            assert!(
                matches!(validate_relative_path(bad), Err(FileTaskError::UnsafePath { .. })),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_empty_and_dot_rejected() {
        assert_eq!(validate_relative_path("  "), Err(FileTaskError::EmptyFilename));
        assert!(matches!(validate_relative_path("."), Err(FileTaskError::UnsafePath { .. })));
    }

    #[test]
    fn test_file_task_requires_task_text() {
        let err = FileTask::new("index.html", "   ").unwrap_err();
        assert_eq!(
            err,
            FileTaskError::EmptyTask {
                filename: "index.html".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_overwrites_in_place() {
        let mut breakdown = Breakdown::new();
        breakdown.push(FileTask::new("index.html", "first").unwrap());
        breakdown.push(FileTask::new("style.css", "styles").unwrap());
        breakdown.push(FileTask::new("index.html", "second").unwrap());

        assert_eq!(breakdown.filenames(), vec!["index.html", "style.css"]);
        assert_eq!(breakdown.tasks()[0].task, "second");
        assert_eq!(breakdown.warnings().len(), 1);
        assert!(breakdown.warnings()[0].contains("index.html"));
    }

    #[test]
    fn test_filename_is_normalized() {
        assert_eq!(FileTask::new("./index.html", "page").unwrap().filename, "index.html");
        assert_eq!(FileTask::new("a\\b.js", "logic").unwrap().filename, "a/b.js");
        assert_eq!(FileTask::new("a//b.js", "logic").unwrap().filename, "a/b.js");
        assert_eq!(FileTask::new(" css/./style.css ", "styles").unwrap().filename, "css/style.css");
    }

    #[test]
    fn test_equivalent_spellings_are_duplicates() {
        let mut breakdown = Breakdown::new();
        breakdown.push(FileTask::new("index.html", "first").unwrap());
        breakdown.push(FileTask::new("./index.html", "second").unwrap());
        breakdown.push(FileTask::new("a/b.js", "one").unwrap());
        breakdown.push(FileTask::new("a\\b.js", "two").unwrap());

        assert_eq!(breakdown.filenames(), vec!["index.html", "a/b.js"]);
        assert_eq!(breakdown.tasks()[0].task, "second");
        assert_eq!(breakdown.tasks()[1].task, "two");
        assert_eq!(breakdown.warnings().len(), 2);
    }

    #[test]
    fn test_breakdown_serializes_for_audit() {
        let breakdown: Breakdown = vec![FileTask::new("app.js", "logic").unwrap()].into_iter().collect();
        let json = breakdown.to_json().unwrap();
        let back: Breakdown = serde_json::from_str(&json).unwrap();
        assert_eq!(back, breakdown);
        assert!(json.contains("\"filename\": \"app.js\""));
    }
}
