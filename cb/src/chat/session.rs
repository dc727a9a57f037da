//! Conversation sessions and the saved-session archive
//!
//! A [`Session`] is owned by one caller and passed by `&mut` into the
//! agent. It only grows until the caller resets it.

use std::fmt;
use std::fs;
use std::path::Path;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Who said a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    Agent,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "User"),
            Self::Agent => write!(f, "Agent"),
        }
    }
}

/// One turn of the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub message: String,
}

impl ChatMessage {
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            message: message.into(),
        }
    }

    pub fn agent(message: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Agent,
            message: message.into(),
        }
    }
}

/// A document attached to the session for summarization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    /// None when the document had no extractable text
    pub text: Option<String>,
}

/// Append-only conversation history plus the attached document
#[derive(Debug, Clone, Default)]
pub struct Session {
    messages: Vec<ChatMessage>,
    attachment: Option<Attachment>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a session from saved messages
    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            attachment: None,
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn push_user(&mut self, message: impl Into<String>) {
        self.push(ChatMessage::user(message));
    }

    pub fn push_agent(&mut self, message: impl Into<String>) {
        self.push(ChatMessage::agent(message));
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// New Chat / Clear Chat: drop every message, keep the attachment
    pub fn reset(&mut self) {
        debug!(message_count = self.messages.len(), "Session::reset: called");
        self.messages.clear();
    }

    pub fn attach(&mut self, name: impl Into<String>, text: Option<String>) {
        let name = name.into();
        debug!(%name, has_text = text.is_some(), "Session::attach: called");
        self.attachment = Some(Attachment { name, text });
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    pub fn detach(&mut self) {
        self.attachment = None;
    }
}

/// Saved sessions, restorable by index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionArchive {
    sessions: Vec<Vec<ChatMessage>>,
}

impl SessionArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot a session; an empty or already-saved session is not added
    ///
    /// Returns true if a new entry was stored.
    pub fn save(&mut self, session: &Session) -> bool {
        debug!(message_count = session.len(), "SessionArchive::save: called");
        if session.is_empty() || self.sessions.iter().any(|s| s.as_slice() == session.messages()) {
            debug!("SessionArchive::save: nothing new to save");
            return false;
        }
        self.sessions.push(session.messages().to_vec());
        true
    }

    /// Copy of the saved session at `index` (0-based)
    pub fn load(&self, index: usize) -> Option<Session> {
        self.sessions.get(index).map(|m| Session::from_messages(m.clone()))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// One-line preview per saved session: first user message, truncated
    pub fn previews(&self, width: usize) -> Vec<String> {
        self.sessions
            .iter()
            .map(|messages| {
                let first = messages
                    .iter()
                    .find(|m| m.role == ChatRole::User)
                    .map(|m| m.message.as_str())
                    .unwrap_or("(no user messages)");
                let preview: String = first.chars().take(width).collect();
                if first.chars().count() > width {
                    format!("{}... ({} messages)", preview, messages.len())
                } else {
                    format!("{} ({} messages)", preview, messages.len())
                }
            })
            .collect()
    }

    /// Read an archive file, or start empty if it does not exist
    pub fn read_from(path: &Path) -> Result<Self> {
        debug!(?path, "SessionArchive::read_from: called");
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).context("Failed to read session archive")?;
        serde_json::from_str(&content).context("Failed to parse session archive")
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        debug!(?path, sessions = self.sessions.len(), "SessionArchive::write_to: called");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create session archive directory")?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).context("Failed to write session archive")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn session(messages: &[&str]) -> Session {
        let mut s = Session::new();
        for (i, m) in messages.iter().enumerate() {
            if i % 2 == 0 {
                s.push_user(*m);
            } else {
                s.push_agent(*m);
            }
        }
        s
    }

    #[test]
    fn test_reset_keeps_attachment() {
        let mut s = session(&["hi", "hello"]);
        s.attach("notes.md", Some("text".to_string()));
        s.reset();
        assert!(s.is_empty());
        assert_eq!(s.attachment().map(|a| a.name.as_str()), Some("notes.md"));
    }

    #[test]
    fn test_save_skips_duplicates_and_empty() {
        let mut archive = SessionArchive::new();
        assert!(!archive.save(&Session::new()));

        let s = session(&["hi", "hello"]);
        assert!(archive.save(&s));
        assert!(!archive.save(&s));
        assert_eq!(archive.len(), 1);

        let longer = session(&["hi", "hello", "again"]);
        assert!(archive.save(&longer));
        assert_eq!(archive.len(), 2);
    }

    #[test]
    fn test_load_by_index() {
        let mut archive = SessionArchive::new();
        archive.save(&session(&["first", "reply"]));
        archive.save(&session(&["second"]));

        let restored = archive.load(1).unwrap();
        assert_eq!(restored.messages(), &[ChatMessage::user("second")]);
        assert!(archive.load(2).is_none());
    }

    #[test]
    fn test_previews() {
        let mut archive = SessionArchive::new();
        archive.save(&session(&["What is the borrow checker?", "It checks borrows."]));
        let previews = archive.previews(10);
        assert_eq!(previews, vec!["What is th... (2 messages)"]);
    }

    #[test]
    fn test_archive_file_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/sessions.json");

        let mut archive = SessionArchive::new();
        archive.save(&session(&["hi", "hello"]));
        archive.write_to(&path).unwrap();

        assert_eq!(SessionArchive::read_from(&path).unwrap(), archive);
        assert!(SessionArchive::read_from(&temp.path().join("missing.json")).unwrap().is_empty());
    }
}
