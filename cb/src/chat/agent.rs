//! Conversation agent: one model completion per user turn

use tracing::{debug, info, warn};

use crate::agents::{AgentContext, AgentError};
use crate::config::ChatConfig;
use crate::prompts::{ChatContext, ChatLine, SummarizeContext};

use super::canned::CannedResponses;
use super::corpus::CorpusIndex;
use super::session::{ChatMessage, Session};

/// Answer given when the attached document had no extractable text
pub const NO_TEXT_ANSWER: &str = "Sorry, no readable text found in your document.";

/// Words in a query that refer to the attached document
const DOCUMENT_KEYWORDS: &[&str] = &["pdf", "document"];

/// Conversational assistant with bounded memory and retrieved context
pub struct ChatAgent {
    ctx: AgentContext,
    canned: CannedResponses,
    memory_limit: usize,
    top_k: usize,
    responder_prefix: String,
}

impl ChatAgent {
    /// Create an agent from a context and the `chat` config section
    ///
    /// The context's options should already carry the chat temperature.
    pub fn new(ctx: AgentContext, config: &ChatConfig) -> Self {
        debug!(memory_limit = %config.memory_limit, top_k = %config.top_k, "ChatAgent::new: called");
        Self {
            ctx,
            canned: CannedResponses::new(config.canned_responses.clone()),
            memory_limit: config.memory_limit.max(1),
            top_k: config.top_k,
            responder_prefix: config.responder_prefix.clone(),
        }
    }

    /// Answer the latest query and record the turn in `session`
    ///
    /// Never fails: provider errors become the user-visible answer.
    pub async fn respond(&self, query: &str, session: &mut Session, corpus: &dyn CorpusIndex) -> String {
        debug!(query_len = query.len(), history = session.len(), "ChatAgent::respond: called");

        let answer = match self.answer(query, session, corpus).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Chat completion failed");
                e.user_message()
            }
        };
        let answer = format!("{}{}", self.responder_prefix, answer);

        session.push_user(query);
        session.push_agent(answer.clone());
        answer
    }

    async fn answer(&self, query: &str, session: &Session, corpus: &dyn CorpusIndex) -> Result<String, AgentError> {
        // Canned answers match the user's own words, never a document body
        let query = match document_query(query, session) {
            DocumentQuery::Unrelated => {
                if let Some(answer) = self.canned.lookup(query) {
                    debug!("ChatAgent::answer: canned response");
                    return Ok(answer.to_string());
                }
                query.to_string()
            }
            DocumentQuery::Summarize(rewritten) => rewritten,
            DocumentQuery::NoText => {
                debug!("ChatAgent::answer: attached document has no text");
                return Ok(NO_TEXT_ANSWER.to_string());
            }
        };

        let context = self.context_for(&query, corpus);

        let messages = session.messages();
        let split = messages.len().saturating_sub(self.memory_limit);
        let (older, recent) = messages.split_at(split);
        let summary = if older.is_empty() {
            None
        } else {
            Some(self.summarize(older).await?)
        };

        let chat = ChatContext {
            context,
            summary,
            conversation: recent.iter().map(chat_line).collect(),
            query,
        };
        let text = self.ctx.ask("chat", &chat).await?;
        Ok(text.trim().to_string())
    }

    /// Collapse older messages into one synopsis line
    async fn summarize(&self, older: &[ChatMessage]) -> Result<String, AgentError> {
        info!(count = older.len(), "Summarizing older conversation");
        let ctx = SummarizeContext {
            messages: older.iter().map(chat_line).collect(),
        };
        let text = self.ctx.ask("summarize", &ctx).await?;
        Ok(text.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    /// Retrieved passages plus anything the augmentation hook adds
    fn context_for(&self, query: &str, corpus: &dyn CorpusIndex) -> String {
        let mut blocks: Vec<String> = corpus
            .retrieve(query, self.top_k)
            .into_iter()
            .map(|p| format!("[{}]\n{}", p.source, p.text))
            .collect();
        let extra = augment(query);
        if !extra.is_empty() {
            blocks.push(extra);
        }
        debug!(blocks = blocks.len(), "ChatAgent::context_for");
        blocks.join("\n\n")
    }
}

/// Retrieval-augmentation hook; contributes nothing yet
fn augment(_query: &str) -> String {
    String::new()
}

enum DocumentQuery {
    Unrelated,
    Summarize(String),
    NoText,
}

fn document_query(query: &str, session: &Session) -> DocumentQuery {
    let Some(attachment) = session.attachment() else {
        return DocumentQuery::Unrelated;
    };
    let lowered = query.to_lowercase();
    if !DOCUMENT_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        return DocumentQuery::Unrelated;
    }
    match &attachment.text {
        Some(text) => DocumentQuery::Summarize(format!("Please summarize this document:\n{}", text)),
        None => DocumentQuery::NoText,
    }
}

fn chat_line(message: &ChatMessage) -> ChatLine {
    ChatLine {
        role: message.role.to_string(),
        message: message.message.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::corpus::{EmptyIndex, KeywordIndex};
    use crate::llm::{MockLlmClient, MockReply};
    use crate::prompts::PromptLoader;
    use std::sync::Arc;

    fn agent(mock: Arc<MockLlmClient>, config: &ChatConfig) -> ChatAgent {
        let ctx = AgentContext::new(mock, Arc::new(PromptLoader::embedded_only()));
        ChatAgent::new(ctx, config)
    }

    fn msg(i: usize) -> String {
        format!("msg{:02}", i)
    }

    #[tokio::test]
    async fn test_overflow_summarizes_oldest_messages() {
        let mock = Arc::new(MockLlmClient::with_texts(["They  discussed\n early topics.", "Final answer"]));
        let agent = agent(mock.clone(), &ChatConfig::default());

        let mut session = Session::new();
        for i in 1..=15 {
            if i % 2 == 1 {
                session.push_user(msg(i));
            } else {
                session.push_agent(msg(i));
            }
        }

        let answer = agent.respond("next question", &mut session, &EmptyIndex).await;
        assert_eq!(answer, "Final answer");

        let prompts = mock.prompts();
        assert_eq!(prompts.len(), 2);

        let summary_prompt = &prompts[0];
        for i in 1..=3 {
            assert!(summary_prompt.contains(&msg(i)), "summary should include {}", msg(i));
        }
        assert!(!summary_prompt.contains(&msg(4)));

        let chat_prompt = &prompts[1];
        assert!(chat_prompt.contains("Summary of previous conversation: They discussed early topics."));
        for i in 4..=15 {
            assert!(chat_prompt.contains(&msg(i)), "chat should include {}", msg(i));
        }
        assert!(!chat_prompt.contains(&msg(1)));
        assert!(chat_prompt.contains("User: next question"));
        assert!(chat_prompt.contains("Only answer the last user query."));

        assert_eq!(session.len(), 17);
    }

    #[tokio::test]
    async fn test_within_limit_makes_one_call() {
        let mock = Arc::new(MockLlmClient::with_texts(["Hello!"]));
        let agent = agent(mock.clone(), &ChatConfig::default());
        let mut session = Session::new();
        session.push_user("hi");
        session.push_agent("hey");

        agent.respond("how are you", &mut session, &EmptyIndex).await;

        assert_eq!(mock.call_count(), 1);
        assert!(!mock.prompts()[0].contains("Summary of previous conversation"));
    }

    #[tokio::test]
    async fn test_canned_response_skips_model() {
        let mock = Arc::new(MockLlmClient::with_texts(Vec::<String>::new()));
        let agent = agent(mock.clone(), &ChatConfig::default());
        let mut session = Session::new();

        let answer = agent.respond("Who created you?", &mut session, &EmptyIndex).await;

        assert_eq!(answer, "I was created by the CoderBuddy team 🚀");
        assert_eq!(mock.call_count(), 0);
        assert_eq!(session.len(), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_becomes_message() {
        let mock = Arc::new(MockLlmClient::new(vec![MockReply::rate_limited()]));
        let agent = agent(mock, &ChatConfig::default());
        let mut session = Session::new();

        let answer = agent.respond("explain traits", &mut session, &EmptyIndex).await;

        assert_eq!(answer, "API rate limit reached. Try again later.");
    }

    #[tokio::test]
    async fn test_document_without_text() {
        let mock = Arc::new(MockLlmClient::with_texts(Vec::<String>::new()));
        let agent = agent(mock.clone(), &ChatConfig::default());
        let mut session = Session::new();
        session.attach("scan.txt", None);

        let answer = agent.respond("summarize my PDF", &mut session, &EmptyIndex).await;

        assert_eq!(answer, NO_TEXT_ANSWER);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_document_query_is_rewritten() {
        let mock = Arc::new(MockLlmClient::with_texts(["It is about ownership."]));
        let agent = agent(mock.clone(), &ChatConfig::default());
        let mut session = Session::new();
        session.attach("notes.md", Some("Ownership moves values.".to_string()));

        agent.respond("What does the document say?", &mut session, &EmptyIndex).await;

        assert!(mock.prompts()[0].contains("Please summarize this document:\nOwnership moves values."));
        // The session records what the user typed
        assert_eq!(session.messages()[0].message, "What does the document say?");
    }

    #[tokio::test]
    async fn test_document_summary_ignores_canned_triggers_in_body() {
        let mock = Arc::new(MockLlmClient::with_texts(["A model trained on images."]));
        let agent = agent(mock.clone(), &ChatConfig::default());
        let mut session = Session::new();
        session.attach("paper.pdf", Some("The model was trained on 10k images.".to_string()));

        let answer = agent.respond("summarize the document", &mut session, &EmptyIndex).await;

        assert_eq!(answer, "A model trained on images.");
        assert_eq!(mock.call_count(), 1);
        assert!(mock.prompts()[0].contains("The model was trained on 10k images."));
    }

    #[tokio::test]
    async fn test_retrieved_context_and_prefix() {
        let mock = Arc::new(MockLlmClient::with_texts(["Borrowing lends."]));
        let config = ChatConfig {
            responder_prefix: "CoderBuddy: ".to_string(),
            ..ChatConfig::default()
        };
        let agent = agent(mock.clone(), &config);
        let mut index = KeywordIndex::new();
        index.add_document("rust.md", "Borrowing lends references.");
        let mut session = Session::new();

        let answer = agent.respond("what is borrowing", &mut session, &index).await;

        assert_eq!(answer, "CoderBuddy: Borrowing lends.");
        assert!(mock.prompts()[0].contains("Context: [rust.md]\nBorrowing lends references."));
    }
}
