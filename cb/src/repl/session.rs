//! REPL session management

use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, warn};

use crate::chat::{ChatAgent, ChatRole, CorpusIndex, KeywordIndex, Session, SessionArchive, SharedCorpus};
use crate::ingest;

/// Interactive chat session
pub struct ChatRepl {
    agent: ChatAgent,
    session: Session,
    archive: SessionArchive,
    archive_path: PathBuf,
    corpus: SharedCorpus,
    corpus_dir: Option<PathBuf>,
}

impl ChatRepl {
    pub fn new(agent: ChatAgent, archive_path: PathBuf, corpus: SharedCorpus, corpus_dir: Option<PathBuf>) -> Self {
        debug!(?archive_path, ?corpus_dir, "ChatRepl::new: called");
        let archive = match SessionArchive::read_from(&archive_path) {
            Ok(archive) => archive,
            Err(e) => {
                warn!(error = %e, "Starting with an empty session archive");
                SessionArchive::new()
            }
        };
        Self {
            agent,
            session: Session::new(),
            archive,
            archive_path,
            corpus,
            corpus_dir,
        }
    }

    /// Run the REPL main loop
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let readline = rl.readline(&format!("{} ", ">".bright_green()));

            match readline {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(input);

                    if input.starts_with('/') {
                        match self.handle_slash_command(SlashCommand::parse(input)) {
                            SlashResult::Continue => continue,
                            SlashResult::Quit => break,
                        }
                    } else {
                        let corpus = self.corpus.snapshot();
                        let answer = self.agent.respond(input, &mut self.session, corpus.as_ref()).await;
                        println!("{}\n", answer);
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    /// Attach a document to the current session
    pub fn attach(&mut self, path: &Path) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        match ingest::extract_text(path) {
            Ok(text) => {
                println!("{} Attached {} ({} chars)", "✓".green(), name, text.chars().count());
                self.session.attach(name, Some(text));
            }
            Err(e) if e.is_no_text() => {
                println!("{} {} has no readable text", "!".yellow(), name);
                self.session.attach(name, None);
            }
            Err(e) => println!("{} {}", "✗".red(), e),
        }
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "CoderBuddy".bright_cyan().bold());
        println!("Ask about code, or attach a document and ask for a summary.");
        println!("Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    fn handle_slash_command(&mut self, command: SlashCommand) -> SlashResult {
        debug!(?command, "ChatRepl::handle_slash_command: called");
        match command {
            SlashCommand::Help => self.print_help(),
            SlashCommand::Quit => {
                self.save_current();
                return SlashResult::Quit;
            }
            SlashCommand::New => {
                self.save_current();
                self.session.reset();
                println!("{}", "Started a new chat.".dimmed());
            }
            SlashCommand::Clear => {
                self.session.reset();
                println!("{}", "Conversation cleared.".dimmed());
            }
            SlashCommand::Save => {
                if !self.save_current() {
                    println!("{}", "Nothing new to save.".dimmed());
                }
            }
            SlashCommand::Sessions => self.print_sessions(),
            SlashCommand::Load(number) => match number.checked_sub(1).and_then(|idx| self.archive.load(idx)) {
                Some(session) => {
                    self.session = session;
                    println!("{} Loaded session {}", "✓".green(), number);
                    self.print_history();
                }
                None => println!("{} No saved session {}", "?".yellow(), number),
            },
            SlashCommand::Attach(path) => self.attach(&path),
            SlashCommand::Detach => {
                self.session.detach();
                println!("{}", "Document detached.".dimmed());
            }
            SlashCommand::Reload => self.reload_corpus(),
            SlashCommand::History => self.print_history(),
            SlashCommand::Unknown(cmd) => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
            }
        }
        SlashResult::Continue
    }

    /// Save the current session; true if something new was stored
    fn save_current(&mut self) -> bool {
        if !self.archive.save(&self.session) {
            return false;
        }
        match self.archive.write_to(&self.archive_path) {
            Ok(()) => println!("{} Session saved ({} total)", "✓".green(), self.archive.len()),
            Err(e) => println!("{} Failed to save session: {}", "✗".red(), e),
        }
        true
    }

    fn reload_corpus(&self) {
        let Some(dir) = &self.corpus_dir else {
            println!("{}", "No corpus directory configured.".dimmed());
            return;
        };
        match KeywordIndex::load_dir(dir) {
            Ok(index) => {
                let passages = index.len();
                self.corpus.replace(Arc::new(index));
                println!("{} Corpus reloaded ({} passages)", "✓".green(), passages);
            }
            Err(e) => println!("{} {}", "✗".red(), e),
        }
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:16} Show this help", "/help".yellow());
        println!("  {:16} Save and exit", "/quit".yellow());
        println!("  {:16} Save this chat and start a new one", "/new".yellow());
        println!("  {:16} Clear the conversation without saving", "/clear".yellow());
        println!("  {:16} Save this chat", "/save".yellow());
        println!("  {:16} List saved chats", "/sessions".yellow());
        println!("  {:16} Restore saved chat N", "/load N".yellow());
        println!("  {:16} Attach a PDF or text document", "/attach FILE".yellow());
        println!("  {:16} Remove the attached document", "/detach".yellow());
        println!("  {:16} Rebuild the retrieval corpus", "/reload".yellow());
        println!("  {:16} Show conversation history", "/history".yellow());
        println!();
    }

    fn print_sessions(&self) {
        if self.archive.is_empty() {
            println!("{}", "No saved sessions.".dimmed());
            return;
        }
        println!();
        println!("{}", "Saved Sessions:".bright_cyan());
        for (i, preview) in self.archive.previews(50).iter().enumerate() {
            println!("  {:>3}. {}", i + 1, preview);
        }
        println!();
    }

    fn print_history(&self) {
        if self.session.is_empty() {
            println!("{}", "No conversation history.".dimmed());
            return;
        }
        println!();
        for msg in self.session.messages() {
            let role = match msg.role {
                ChatRole::User => "User".bright_green(),
                ChatRole::Agent => "Agent".bright_blue(),
            };
            let preview: String = msg.message.chars().take(80).collect();
            let ellipsis = if msg.message.chars().count() > 80 { "..." } else { "" };
            println!("  {}: {}{}", role, preview, ellipsis);
        }
        println!();
    }
}

/// A parsed `/command`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Quit,
    New,
    Clear,
    Save,
    Sessions,
    /// 1-based session number
    Load(usize),
    Attach(PathBuf),
    Detach,
    Reload,
    History,
    Unknown(String),
}

impl SlashCommand {
    pub fn parse(input: &str) -> Self {
        let mut parts = input.trim().splitn(2, char::is_whitespace);
        let cmd = parts.next().unwrap_or("");
        let arg = parts.next().map(str::trim).unwrap_or("");

        match cmd {
            "/help" | "/h" => Self::Help,
            "/quit" | "/q" | "/exit" => Self::Quit,
            "/new" => Self::New,
            "/clear" | "/c" => Self::Clear,
            "/save" => Self::Save,
            "/sessions" => Self::Sessions,
            "/load" => match arg.parse() {
                Ok(n) => Self::Load(n),
                Err(_) => Self::Unknown(input.trim().to_string()),
            },
            "/attach" if !arg.is_empty() => Self::Attach(PathBuf::from(arg)),
            "/detach" => Self::Detach,
            "/reload" => Self::Reload,
            "/history" => Self::History,
            _ => Self::Unknown(input.trim().to_string()),
        }
    }
}

/// Result of handling a slash command
enum SlashResult {
    Continue,
    Quit,
}
