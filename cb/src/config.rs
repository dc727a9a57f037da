//! CoderBuddy configuration types and loading

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm::LlmError;

/// Main CoderBuddy configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Project generation pipeline options
    pub pipeline: PipelineConfig,

    /// Conversation agent options
    pub chat: ChatConfig,

    /// Where and how generated files are written
    pub output: OutputConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that the API key environment variable is set. Call this before
    /// any pipeline stage runs so a missing key fails fast.
    pub fn validate(&self) -> Result<()> {
        debug!(api_key_env = %self.llm.api_key_env, "Config::validate: called");
        self.llm.get_api_key().map_err(|e| eyre::eyre!("{}", e))?;
        if self.pipeline.concurrency == 0 {
            return Err(eyre::eyre!("pipeline.concurrency must be at least 1"));
        }
        if self.chat.memory_limit == 0 {
            return Err(eyre::eyre!("chat.memory-limit must be at least 1"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .coderbuddy.yml
        let local_config = PathBuf::from(".coderbuddy.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/coderbuddy/coderbuddy.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("coderbuddy").join("coderbuddy.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read just the log level, before logging is initialized
    ///
    /// Errors are swallowed here; the full `load` reports them later.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("openai" or "anthropic")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// HTTP request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Sampling temperature for pipeline agents
    pub temperature: f32,

    /// Sampling temperature for the chat assistant
    #[serde(rename = "chat-temperature")]
    pub chat_temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com".to_string(),
            max_tokens: 4096,
            timeout_ms: 120_000,
            temperature: 0.0,
            chat_temperature: 0.7,
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String, LlmError> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(LlmError::MissingApiKey {
                env: self.api_key_env.clone(),
            }),
        }
    }
}

/// Project generation pipeline options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Emit each generated file as soon as it completes
    #[serde(rename = "per-file-streaming")]
    pub per_file_streaming: bool,

    /// Prefix for progress lines shown to the user
    #[serde(rename = "response-prefix")]
    pub response_prefix: String,

    /// Maximum concurrent per-file generation calls (1 = sequential)
    pub concurrency: usize,

    /// Re-prompts allowed when the breakdown output cannot be parsed
    #[serde(rename = "repair-attempts")]
    pub repair_attempts: u32,

    /// Deadline for each LLM call in milliseconds
    #[serde(rename = "deadline-ms")]
    pub deadline_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            per_file_streaming: true,
            response_prefix: String::new(),
            concurrency: 1,
            repair_attempts: 1,
            deadline_ms: 180_000,
        }
    }
}

impl PipelineConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

/// Conversation agent options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Messages kept verbatim before older ones are summarized
    #[serde(rename = "memory-limit")]
    pub memory_limit: usize,

    /// Marker prepended to every assistant answer
    #[serde(rename = "responder-prefix")]
    pub responder_prefix: String,

    /// Directory of documents forming the retrieval corpus
    #[serde(rename = "corpus-dir")]
    pub corpus_dir: Option<PathBuf>,

    /// Passages retrieved per query
    #[serde(rename = "top-k")]
    pub top_k: usize,

    /// Deadline for each LLM call in milliseconds
    #[serde(rename = "deadline-ms")]
    pub deadline_ms: u64,

    /// Ordered keyword -> fixed answer table checked before the model
    #[serde(rename = "canned-responses")]
    pub canned_responses: Vec<CannedResponse>,
}

/// One keyword trigger and its fixed answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CannedResponse {
    pub keyword: String,
    pub answer: String,
}

impl CannedResponse {
    pub fn new(keyword: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            answer: answer.into(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            memory_limit: 12,
            responder_prefix: String::new(),
            corpus_dir: None,
            top_k: 4,
            deadline_ms: 120_000,
            canned_responses: default_canned_responses(),
        }
    }
}

impl ChatConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

/// Identity and provenance answers, most specific phrases first
pub fn default_canned_responses() -> Vec<CannedResponse> {
    vec![
        CannedResponse::new("who created you", "I was created by the CoderBuddy team 🚀"),
        CannedResponse::new("creator", "My creator is the CoderBuddy team."),
        CannedResponse::new("who is your father", "I don't have a father, but the CoderBuddy team built me 👨‍💻"),
        CannedResponse::new("father", "The CoderBuddy team built me."),
        CannedResponse::new("who trained you", "I was trained by the CoderBuddy team."),
        CannedResponse::new("trained", "I was trained and configured by the CoderBuddy team."),
    ]
}

/// Where and how generated files are written
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root directory for generated projects
    #[serde(rename = "project-root")]
    pub project_root: PathBuf,

    /// Subdirectory -> file extensions routed into it
    #[serde(rename = "asset-dirs")]
    pub asset_dirs: BTreeMap<String, Vec<String>>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        let mut asset_dirs = BTreeMap::new();
        asset_dirs.insert(
            "assets".to_string(),
            ["png", "jpg", "jpeg", "gif", "svg", "ico", "webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        Self {
            project_root: PathBuf::from("generated"),
            asset_dirs,
        }
    }
}
