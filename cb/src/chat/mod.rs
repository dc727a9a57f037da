//! Conversation agent
//!
//! A [`Session`] holds one user's history and is passed by `&mut` into
//! [`ChatAgent::respond`]. Retrieval goes through the [`CorpusIndex`] trait;
//! [`SharedCorpus`] lets the index be rebuilt while chats continue.

mod agent;
mod canned;
mod corpus;
mod session;

pub use agent::{ChatAgent, NO_TEXT_ANSWER};
pub use canned::CannedResponses;
pub use corpus::{CorpusIndex, EmptyIndex, KeywordIndex, Passage, SharedCorpus};
pub use session::{Attachment, ChatMessage, ChatRole, Session, SessionArchive};
