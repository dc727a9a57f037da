//! GeneratedFile and per-file outcomes

use serde::{Deserialize, Serialize};

/// A generated file: relative path plus its full content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub filename: String,
    pub content: String,
}

impl GeneratedFile {
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }
}

/// What happened to one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    Generated { content: String },
    Failed { reason: String },
}

/// Per-file entry of a run report, in breakdown order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub filename: String,
    #[serde(flatten)]
    pub status: FileStatus,
}

impl FileOutcome {
    pub fn generated(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            status: FileStatus::Generated {
                content: content.into(),
            },
        }
    }

    pub fn failed(filename: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            status: FileStatus::Failed { reason: reason.into() },
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self.status, FileStatus::Generated { .. })
    }

    pub fn content(&self) -> Option<&str> {
        match &self.status {
            FileStatus::Generated { content } => Some(content),
            FileStatus::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match &self.status {
            FileStatus::Generated { .. } => None,
            FileStatus::Failed { reason } => Some(reason),
        }
    }

    /// The generated file, if this outcome succeeded
    pub fn to_generated(&self) -> Option<GeneratedFile> {
        self.content().map(|c| GeneratedFile::new(self.filename.clone(), c))
    }
}
