//! Interactive chat REPL
//!
//! Line editing via rustyline, slash commands for session management,
//! one [`ChatAgent`](crate::chat::ChatAgent) turn per input line.

mod session;

pub use session::{ChatRepl, SlashCommand};

use std::path::PathBuf;
use std::sync::Arc;

use eyre::{Context, Result};
use tracing::{info, warn};

use crate::agents::AgentContext;
use crate::chat::{ChatAgent, KeywordIndex, SharedCorpus};
use crate::cli::get_sessions_path;
use crate::config::Config;
use crate::llm::{CompletionOptions, create_client};
use crate::prompts::PromptLoader;

/// Build the chat agent described by `config`
pub fn build_agent(config: &Config) -> Result<ChatAgent> {
    let llm = create_client(&config.llm).context("Failed to create LLM client")?;
    let prompts = Arc::new(PromptLoader::new(std::env::current_dir()?));
    let options = CompletionOptions {
        system_prompt: None,
        max_tokens: config.llm.max_tokens,
        temperature: config.llm.chat_temperature,
    };
    let ctx = AgentContext::new(llm, prompts)
        .with_options(options)
        .with_deadline(config.chat.deadline());
    Ok(ChatAgent::new(ctx, &config.chat))
}

/// Run the interactive REPL
///
/// This is the main entry point for `cb chat` (and bare `cb`).
pub async fn run_interactive(config: &Config, corpus_dir: Option<PathBuf>, attach: Option<PathBuf>) -> Result<()> {
    config.validate()?;

    let agent = build_agent(config)?;
    let corpus_dir = corpus_dir.or_else(|| config.chat.corpus_dir.clone());

    let corpus = SharedCorpus::empty();
    if let Some(dir) = &corpus_dir {
        match KeywordIndex::load_dir(dir) {
            Ok(index) => corpus.replace(Arc::new(index)),
            Err(e) => warn!(error = %e, "Continuing without a corpus"),
        }
    }

    let archive_path = get_sessions_path();
    info!(?archive_path, "Starting chat REPL");
    let mut repl = ChatRepl::new(agent, archive_path, corpus, corpus_dir);
    if let Some(path) = attach {
        repl.attach(&path);
    }
    repl.run().await
}
