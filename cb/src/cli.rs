//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// CoderBuddy - multi-agent project generator and chat assistant
#[derive(Parser)]
#[command(
    name = "cb",
    about = "Generate small projects with a Plan -> Breakdown -> Files agent pipeline, or chat about code",
    version = env!("GIT_DESCRIBE"),
    after_help = after_help()
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute (defaults to chat)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a project from a natural-language request
    Generate {
        /// What to build, e.g. "a to-do list web app"
        #[arg(required = true, num_args = 1..)]
        request: Vec<String>,

        /// Directory to write files into (defaults to output.project-root)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Also write a zip archive of the generated files
        #[arg(short, long)]
        zip: Option<PathBuf>,

        /// Serve the generated project after writing it
        #[arg(long)]
        serve: bool,

        /// Report all files at the end instead of as each completes
        #[arg(long)]
        batch: bool,

        /// Output format for the final report
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Interactive conversation with the assistant
    Chat {
        /// Directory of documents to retrieve context from
        #[arg(long)]
        corpus: Option<PathBuf>,

        /// Document to attach to the session
        #[arg(short, long)]
        attach: Option<PathBuf>,
    },

    /// Summarize a PDF or text document
    Summarize {
        /// Document to summarize
        file: PathBuf,
    },

    /// Serve a directory read-only over HTTP
    Serve {
        /// Directory to serve (defaults to output.project-root)
        dir: Option<PathBuf>,

        /// Port to bind on 127.0.0.1 (0 picks a free port)
        #[arg(short, long, default_value_t = 0)]
        port: u16,
    },

    /// Show the event log of a previous run
    Events {
        /// Run ID printed by `cb generate`
        run_id: String,
    },

    /// Show application logs
    Logs {
        /// Number of lines to show
        #[arg(short = 'n', long, default_value_t = 50)]
        lines: usize,
    },
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("coderbuddy")
        .join("logs")
        .join("coderbuddy.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Saved chat sessions
pub fn get_sessions_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("coderbuddy")
        .join("sessions.json")
}

fn after_help() -> String {
    format!("Logs are written to: {}\n", get_log_path().display())
}

/// Output format for reports
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use text or json", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["cb"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parse_generate() {
        let cli = Cli::parse_from(["cb", "generate", "a", "to-do", "app", "--zip", "todo.zip", "--batch"]);
        if let Some(Command::Generate {
            request,
            zip,
            batch,
            serve,
            format,
            ..
        }) = cli.command
        {
            assert_eq!(request.join(" "), "a to-do app");
            assert_eq!(zip, Some(PathBuf::from("todo.zip")));
            assert!(batch);
            assert!(!serve);
            assert_eq!(format, OutputFormat::Text);
        } else {
            panic!("Expected Generate command");
        }
    }

    #[test]
    fn test_cli_generate_requires_request() {
        assert!(Cli::try_parse_from(["cb", "generate"]).is_err());
    }

    #[test]
    fn test_cli_parse_serve_port() {
        let cli = Cli::parse_from(["cb", "serve", "site", "-p", "8080"]);
        assert!(matches!(
            cli.command,
            Some(Command::Serve { dir: Some(_), port: 8080 })
        ));
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("PLAIN".parse::<OutputFormat>(), Ok(OutputFormat::Text));
        assert!("table".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_cli_with_config() {
        let cli = Cli::parse_from(["cb", "-c", "/path/to/config.yml", "chat"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.yml")));
    }
}
