//! CoderBuddy - multi-agent project generator
//!
//! CLI entry point for generation runs, the chat REPL and previews.

use std::fs;
use std::io::{BufRead, BufReader};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info, warn};

use coderbuddy::cancel::CancelFlag;
use coderbuddy::chat::{EmptyIndex, Session};
use coderbuddy::cli::{Cli, Command, OutputFormat, get_log_path};
use coderbuddy::config::Config;
use coderbuddy::console::{render_event, spawn_console_printer};
use coderbuddy::domain::ProjectRequest;
use coderbuddy::events::{EventBus, default_runs_dir, read_run_events, spawn_event_logger};
use coderbuddy::ingest;
use coderbuddy::llm::create_client;
use coderbuddy::output::{self, ProjectLayout};
use coderbuddy::pipeline::{Orchestrator, PipelineOptions};
use coderbuddy::prompts::PromptLoader;
use coderbuddy::repl;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(provider = %config.llm.provider, model = %config.llm.model, "CoderBuddy loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Generate {
            request,
            out,
            zip,
            serve,
            batch,
            format,
        }) => {
            let args = GenerateArgs {
                request: request.join(" "),
                out,
                zip,
                serve,
                batch,
                format,
            };
            cmd_generate(&config, args).await
        }
        Some(Command::Chat { corpus, attach }) => repl::run_interactive(&config, corpus, attach).await,
        Some(Command::Summarize { file }) => cmd_summarize(&config, &file).await,
        Some(Command::Serve { dir, port }) => {
            let dir = dir.unwrap_or_else(|| config.output.project_root.clone());
            cmd_serve(&dir, port).await
        }
        Some(Command::Events { run_id }) => cmd_events(&run_id),
        Some(Command::Logs { lines }) => cmd_logs(lines),
        None => repl::run_interactive(&config, None, None).await,
    }
}

struct GenerateArgs {
    request: String,
    out: Option<PathBuf>,
    zip: Option<PathBuf>,
    serve: bool,
    batch: bool,
    format: OutputFormat,
}

/// Run the full pipeline for one request
async fn cmd_generate(config: &Config, args: GenerateArgs) -> Result<()> {
    debug!(request = %args.request, batch = args.batch, "cmd_generate: called");
    config.validate()?;

    let llm = create_client(&config.llm).context("Failed to create LLM client")?;
    let prompts = Arc::new(PromptLoader::new(std::env::current_dir()?));
    let mut options = PipelineOptions::from_config(config);
    if args.batch {
        options.per_file_streaming = false;
    }

    let bus = Arc::new(EventBus::with_default_capacity());
    let logger = match spawn_event_logger(bus.clone()) {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Run log disabled");
            None
        }
    };
    let printer = (args.format == OutputFormat::Text).then(|| spawn_console_printer(bus.clone()));

    let cancel = CancelFlag::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling after the current step...");
            on_ctrl_c.cancel();
        }
    });

    let mut orchestrator = Orchestrator::new(llm, prompts, options)
        .with_event_bus(bus)
        .with_cancel_flag(cancel);
    let result = orchestrator.run(ProjectRequest::new(args.request)).await;

    // Dropping the orchestrator closes the bus so the logger can finish
    drop(orchestrator);
    if let Some(printer) = printer {
        let _ = printer.await;
    }
    if let Some(logger) = logger
        && let Err(e) = logger.await
    {
        warn!(error = %e, "Run log task failed");
    }

    let out_dir = args.out.unwrap_or_else(|| config.output.project_root.clone());
    let layout = ProjectLayout::new(&out_dir, &config.output.asset_dirs);

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            if let Some(raw) = e.raw() {
                eprintln!("{}\n{}", "Raw model output:".dimmed(), raw);
            }
            if let Some(partial) = e.partial()
                && partial.generated_count() > 0
            {
                layout.write_all(&partial.generated_files())?;
                eprintln!(
                    "Kept {} finished files in {}",
                    partial.generated_count(),
                    out_dir.display()
                );
            }
            return Err(eyre::eyre!("{}", e.user_message()));
        }
    };

    let files = report.generated_files();
    layout.write_all(&files)?;

    if let Some(zip_path) = &args.zip {
        output::write_zip(zip_path, &files)?;
        info!(?zip_path, "Wrote archive");
    }

    match args.format {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Text => {
            println!();
            println!(
                "{} {} files written to {} ({} failed)",
                "✓".green(),
                report.generated_count(),
                out_dir.display(),
                report.failed_count()
            );
            if let Some(zip_path) = &args.zip {
                println!("  Archive: {}", zip_path.display());
            }
            println!("  Run ID: {}", report.run_id);
        }
    }

    if args.serve {
        cmd_serve(&out_dir, 0).await?;
    }
    Ok(())
}

/// Summarize one document through the chat agent
async fn cmd_summarize(config: &Config, file: &Path) -> Result<()> {
    debug!(?file, "cmd_summarize: called");
    config.validate()?;

    let text = match ingest::extract_text(file) {
        Ok(text) => Some(text),
        Err(e) if e.is_no_text() => None,
        Err(e) => return Err(e.into()),
    };

    let agent = repl::build_agent(config)?;
    let mut session = Session::new();
    session.attach(file.display().to_string(), text);
    let answer = agent.respond("Summarize this document", &mut session, &EmptyIndex).await;
    println!("{}", answer);
    Ok(())
}

/// Serve a directory until Ctrl+C
async fn cmd_serve(dir: &Path, port: u16) -> Result<()> {
    debug!(?dir, port, "cmd_serve: called");
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let server = output::serve(dir, addr).await?;
    println!("Serving {} at {} (Ctrl+C to stop)", dir.display(), server.url().bright_cyan());

    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;
    server.shutdown();
    Ok(())
}

/// Print the event log of a previous run
fn cmd_events(run_id: &str) -> Result<()> {
    debug!(%run_id, "cmd_events: called");
    uuid::Uuid::parse_str(run_id).map_err(|_| eyre::eyre!("Not a run ID: {}", run_id))?;
    let entries = read_run_events(default_runs_dir()?, run_id)?;
    if entries.is_empty() {
        println!("No events recorded for run {}", run_id);
        return Ok(());
    }

    for entry in entries {
        let ts = entry.timestamp.format("%H:%M:%S");
        match render_event(&entry.event) {
            Some(line) => println!("{} {}", ts.to_string().dimmed(), line),
            None => println!("{} {}", ts.to_string().dimmed(), entry.event.event_type().dimmed()),
        }
    }
    Ok(())
}

/// Print the last lines of the log file
fn cmd_logs(lines: usize) -> Result<()> {
    debug!(lines, "cmd_logs: called");
    let log_path = get_log_path();

    if !log_path.exists() {
        println!("No log file found at: {}", log_path.display());
        return Ok(());
    }

    let file = fs::File::open(&log_path).context("Failed to open log file")?;
    let all_lines: Vec<String> = BufReader::new(file).lines().map_while(Result::ok).collect();
    let start = all_lines.len().saturating_sub(lines);
    for line in &all_lines[start..] {
        println!("{}", line);
    }
    Ok(())
}
