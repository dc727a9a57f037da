//! LlmClient trait definition

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmError};

/// Stateless LLM client - each call is independent (fresh context)
///
/// Implementations perform exactly one request per call and never retry;
/// retry and repair policy belongs to the callers.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single completion request (blocking until complete)
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

pub mod mock {
    //! Scripted client for tests and offline runs

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tracing::debug;

    /// One scripted reply
    #[derive(Debug)]
    pub enum MockReply {
        Text(String),
        Error(LlmError),
        /// Sleep before answering (for deadline tests)
        Delayed(Duration, String),
    }

    impl MockReply {
        pub fn text(s: impl Into<String>) -> Self {
            MockReply::Text(s.into())
        }

        pub fn rate_limited() -> Self {
            MockReply::Error(LlmError::RateLimited {
                retry_after: Duration::from_secs(60),
            })
        }

        pub fn server_error(message: impl Into<String>) -> Self {
            MockReply::Error(LlmError::ApiError {
                status: 500,
                message: message.into(),
            })
        }
    }

    /// Mock LLM client that replays scripted replies in order
    ///
    /// Every request is recorded so tests can assert on the prompts sent.
    pub struct MockLlmClient {
        replies: Mutex<VecDeque<MockReply>>,
        requests: Mutex<Vec<CompletionRequest>>,
        call_count: AtomicUsize,
    }

    impl MockLlmClient {
        pub fn new(replies: Vec<MockReply>) -> Self {
            debug!(reply_count = %replies.len(), "MockLlmClient::new: called");
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
                call_count: AtomicUsize::new(0),
            }
        }

        /// Convenience: every reply is plain text
        pub fn with_texts<I, S>(texts: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self::new(texts.into_iter().map(|t| MockReply::Text(t.into())).collect())
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Requests received so far, in order
        pub fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().map(|r| r.clone()).unwrap_or_default()
        }

        /// Last user prompt of every request, in order
        pub fn prompts(&self) -> Vec<String> {
            self.requests()
                .iter()
                .map(|r| r.last_prompt().unwrap_or_default().to_string())
                .collect()
        }
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            debug!(%idx, "MockLlmClient::complete: called");
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request);
            }

            let reply = self.replies.lock().ok().and_then(|mut r| r.pop_front());
            match reply {
                Some(MockReply::Text(text)) => Ok(CompletionResponse::text(text)),
                Some(MockReply::Error(e)) => Err(e),
                Some(MockReply::Delayed(delay, text)) => {
                    tokio::time::sleep(delay).await;
                    Ok(CompletionResponse::text(text))
                }
                None => {
                    debug!("MockLlmClient::complete: no more mock replies");
                    Err(LlmError::InvalidResponse("No more mock responses".to_string()))
                }
            }
        }
    }

}
