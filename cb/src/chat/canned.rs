//! Fixed answers checked before the model is asked

use tracing::debug;

use crate::config::CannedResponse;

/// Ordered keyword -> answer table; first match wins
#[derive(Debug, Clone, Default)]
pub struct CannedResponses {
    entries: Vec<CannedResponse>,
}

impl CannedResponses {
    pub fn new(entries: Vec<CannedResponse>) -> Self {
        let entries = entries
            .into_iter()
            .map(|e| CannedResponse::new(e.keyword.to_lowercase(), e.answer))
            .collect();
        Self { entries }
    }

    /// Case-insensitive substring match against the query
    pub fn lookup(&self, query: &str) -> Option<&str> {
        let normalized = query.to_lowercase();
        let hit = self
            .entries
            .iter()
            .find(|e| !e.keyword.is_empty() && normalized.contains(&e.keyword));
        debug!(matched = hit.map(|e| e.keyword.as_str()), "CannedResponses::lookup");
        hit.map(|e| e.answer.as_str())
    }
}
