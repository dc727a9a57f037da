//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// Planner prompt: request -> free-text plan
pub const PLAN: &str = include_str!("../../prompts/plan.pmt");

/// Architect prompt: plan -> JSON array of file tasks
pub const BREAKDOWN: &str = include_str!("../../prompts/breakdown.pmt");

/// Architect re-prompt after unparseable output
pub const BREAKDOWN_REPAIR: &str = include_str!("../../prompts/breakdown-repair.pmt");

/// Coder prompt: one file from plan + task
pub const FILE: &str = include_str!("../../prompts/file.pmt");

/// Conversation agent prompt
pub const CHAT: &str = include_str!("../../prompts/chat.pmt");

/// Memory summarization prompt
pub const SUMMARIZE: &str = include_str!("../../prompts/summarize.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "plan" => Some(PLAN),
        "breakdown" => Some(BREAKDOWN),
        "breakdown-repair" => Some(BREAKDOWN_REPAIR),
        "file" => Some(FILE),
        "chat" => Some(CHAT),
        "summarize" => Some(SUMMARIZE),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}
