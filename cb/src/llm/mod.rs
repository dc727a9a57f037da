//! LLM Client module for CoderBuddy
//!
//! Provides the client adapter every agent calls through: one prompt in,
//! raw text out, provider failures mapped onto [`LlmError`].

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

mod anthropic;
pub mod client;
mod error;
mod openai;
mod types;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;
pub use client::mock::{MockLlmClient, MockReply};
pub use error::LlmError;
pub use openai::OpenAIClient;
pub use types::{CompletionOptions, CompletionRequest, CompletionResponse, Message, Role, StopReason, TokenUsage};

use crate::config::LlmConfig;

/// Default rate-limit backoff when the provider sends no retry-after header
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Create an LLM client based on the provider specified in config
///
/// Supports "openai" and "anthropic" providers.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIClient::from_config(config)?)),
        "anthropic" => Ok(Arc::new(AnthropicClient::from_config(config)?)),
        other => {
            debug!(provider = %other, "create_client: unknown provider");
            Err(LlmError::InvalidResponse(format!(
                "Unknown LLM provider: '{}'. Supported: openai, anthropic",
                other
            )))
        }
    }
}

/// Issue one completion for a single prompt and return its text
///
/// The deadline bounds the whole call; expiry surfaces as
/// [`LlmError::Timeout`]. An empty completion is a provider error.
pub async fn complete_text(
    llm: &dyn LlmClient,
    prompt: &str,
    options: &CompletionOptions,
    deadline: Duration,
) -> Result<String, LlmError> {
    debug!(prompt_len = prompt.len(), ?deadline, "complete_text: called");
    let request = CompletionRequest::from_prompt(prompt, options);
    complete_request(llm, request, deadline).await
}

/// Deadline-bounded variant of [`LlmClient::complete`] returning text
pub async fn complete_request(
    llm: &dyn LlmClient,
    request: CompletionRequest,
    deadline: Duration,
) -> Result<String, LlmError> {
    let response = match tokio::time::timeout(deadline, llm.complete(request)).await {
        Ok(result) => result?,
        Err(_) => {
            debug!(?deadline, "complete_request: deadline exceeded");
            return Err(LlmError::Timeout(deadline));
        }
    };

    match response.content {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(LlmError::InvalidResponse("Model returned no text content".to_string())),
    }
}

/// Read a `retry-after` header in seconds, defaulting when absent or unparseable
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Duration {
    let secs = headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
    Duration::from_secs(secs)
}
