//! CoderBuddy - multi-agent project generator and chat assistant
//!
//! A request flows through three agents, each one stateless LLM call:
//! the planner writes a free-text plan, the architect turns it into a
//! validated file breakdown, and the coder generates every file. The
//! orchestrator sequences them as a small state machine and publishes each
//! result on an event bus. A separate conversation agent answers questions
//! with bounded memory and retrieved context.
//!
//! # Modules
//!
//! - [`llm`] - LLM client trait, OpenAI and Anthropic implementations
//! - [`sanitize`] - Recovering a JSON array from free-form model output
//! - [`agents`] - Planner, architect and coder
//! - [`pipeline`] - Orchestrator state machine
//! - [`events`] - Event bus and run log
//! - [`chat`] - Conversation agent, sessions and retrieval corpus
//! - [`output`] - Disk layout, zip export and preview server
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod agents;
pub mod cancel;
pub mod chat;
pub mod cli;
pub mod config;
pub mod console;
pub mod domain;
pub mod events;
pub mod ingest;
pub mod llm;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod repl;
pub mod sanitize;

// Re-export commonly used types
pub use agents::{AgentContext, AgentError, Architect, BreakdownError, Coder, FileGenerationError, Planner};
pub use cancel::CancelFlag;
pub use chat::{ChatAgent, CorpusIndex, KeywordIndex, Session, SessionArchive, SharedCorpus};
pub use config::{Config, LlmConfig};
pub use domain::{Breakdown, FileOutcome, FileTask, GeneratedFile, ProjectPlan, ProjectRequest};
pub use events::{EventBus, EventEmitter, EventLogEntry, EventLogger, PipelineEvent, spawn_event_logger};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, create_client};
pub use pipeline::{Orchestrator, PipelineError, PipelineOptions, RunReport, RunState};
pub use prompts::PromptLoader;
pub use sanitize::{SanitizeError, sanitize};
