//! Free-form questions about the current topic.

use crate::error::{FetchError, ParseError, ValidationError};
use crate::llm_client::{LLMClient, render_prompt};
use crate::token::RequestToken;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Shown in place of an answer when the answerer could not be reached.
pub const CHAT_ERROR_PLACEHOLDER: &str = "Error: could not get response.";

/// Answers a single question about a topic.
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn answer(&self, topic: &str, question: &str) -> Result<String, FetchError>;
}

/// An implementation of `ChatService` backed by an LLM tutor prompt.
pub struct LLMChatService {
    llm: Arc<dyn LLMClient>,
    prompt_template: String,
}

impl LLMChatService {
    /// `prompt_template` may use `{topic}` and `{question}`.
    pub fn new(llm: Arc<dyn LLMClient>, prompt_template: String) -> Self {
        Self {
            llm,
            prompt_template,
        }
    }
}

#[async_trait]
impl ChatService for LLMChatService {
    async fn answer(&self, topic: &str, question: &str) -> Result<String, FetchError> {
        let prompt = render_prompt(
            &self.prompt_template,
            &[("topic", topic), ("question", question)],
        );
        let system = format!("You are an expert tutor on \"{topic}\".");
        let answer = self.llm.complete(&system, prompt).await?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(ParseError::MissingField("answer").into());
        }
        Ok(answer.to_string())
    }
}

/// A mock `ChatService` that echoes the question back.
pub struct MockChatService;

#[async_trait]
impl ChatService for MockChatService {
    async fn answer(&self, topic: &str, question: &str) -> Result<String, FetchError> {
        Ok(format!("A short answer about {topic}: {question}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatStatus {
    Idle,
    Loading,
    Answered,
    Errored,
}

/// A single pending question/answer exchange. Newer questions replace older ones.
#[derive(Debug, Clone)]
pub struct ChatSession {
    topic: String,
    question: String,
    status: ChatStatus,
    answer: String,
    last_token: RequestToken,
    outstanding: Option<RequestToken>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            topic: String::new(),
            question: String::new(),
            status: ChatStatus::Idle,
            answer: String::new(),
            last_token: RequestToken::default(),
            outstanding: None,
        }
    }

    pub fn status(&self) -> ChatStatus {
        self.status
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    /// Starts a new exchange, superseding any outstanding one.
    pub fn ask(&mut self, topic: &str, question: &str) -> Result<RequestToken, ValidationError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ValidationError::EmptyQuestion);
        }
        self.last_token = self.last_token.next();
        self.outstanding = Some(self.last_token);
        self.topic = topic.to_string();
        self.question = question.to_string();
        self.status = ChatStatus::Loading;
        debug!(token = %self.last_token, "Chat question issued");
        Ok(self.last_token)
    }

    /// Applies the outcome of the request tagged `token`; stale tokens are ignored.
    pub fn resolve(&mut self, token: RequestToken, result: Result<String, FetchError>) -> bool {
        if self.outstanding != Some(token) {
            debug!(%token, "Discarding stale chat response");
            return false;
        }
        self.outstanding = None;
        match result {
            Ok(answer) => {
                self.answer = answer;
                self.status = ChatStatus::Answered;
            }
            Err(e) => {
                warn!(topic = %self.topic, error = %e, "Chat request failed");
                self.answer = CHAT_ERROR_PLACEHOLDER.to_string();
                self.status = ChatStatus::Errored;
            }
        }
        true
    }

    /// Forgets the exchange; used when a new topic is loaded.
    pub fn reset(&mut self) {
        self.outstanding = None;
        self.topic.clear();
        self.question.clear();
        self.answer.clear();
        self.status = ChatStatus::Idle;
    }

    pub fn view(&self) -> ChatView {
        ChatView {
            topic: self.topic.clone(),
            question: self.question.clone(),
            status: self.status,
            answer: self.answer.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatView {
    pub topic: String,
    pub question: String,
    pub status: ChatStatus,
    pub answer: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records the last prompt and answers with a fixed string.
    #[derive(Default)]
    struct RecordingLlm {
        prompt: Mutex<String>,
    }

    #[async_trait]
    impl LLMClient for RecordingLlm {
        async fn complete(&self, _system: &str, prompt: String) -> Result<String, FetchError> {
            *self.prompt.lock().unwrap() = prompt;
            Ok(" Because. ".to_string())
        }
    }

    #[tokio::test]
    async fn topic_text_is_inserted_verbatim() {
        let llm = Arc::new(RecordingLlm::default());
        let service = LLMChatService::new(llm.clone(), "Topic: {topic}\nQ: {question}".into());

        let answer = service.answer("Rust {question} macros", "why?").await.unwrap();

        assert_eq!(answer, "Because.");
        assert_eq!(
            *llm.prompt.lock().unwrap(),
            "Topic: Rust {question} macros\nQ: why?"
        );
    }

    #[test]
    fn late_answer_to_earlier_question_is_discarded() {
        let mut chat = ChatSession::new();
        let q1 = chat.ask("Rust", "q1").unwrap();
        let q2 = chat.ask("Rust", "q2").unwrap();

        assert!(chat.resolve(q2, Ok("a2".into())));
        assert!(!chat.resolve(q1, Ok("a1".into())));

        assert_eq!(chat.answer(), "a2");
        assert_eq!(chat.question(), "q2");
        assert_eq!(chat.status(), ChatStatus::Answered);
    }

    #[test]
    fn failure_uses_placeholder() {
        let mut chat = ChatSession::new();
        let t = chat.ask("Rust", "why?").unwrap();
        chat.resolve(t, Err(ParseError::MissingField("answer").into()));
        assert_eq!(chat.status(), ChatStatus::Errored);
        assert_eq!(chat.answer(), CHAT_ERROR_PLACEHOLDER);
    }

    #[test]
    fn blank_question_is_rejected_without_state_change() {
        let mut chat = ChatSession::new();
        assert_eq!(chat.ask("Rust", "   "), Err(ValidationError::EmptyQuestion));
        assert_eq!(chat.status(), ChatStatus::Idle);
    }

    #[test]
    fn asking_again_restarts_after_answer() {
        let mut chat = ChatSession::new();
        let t = chat.ask("Rust", "q1").unwrap();
        chat.resolve(t, Ok("a1".into()));

        let t2 = chat.ask("Rust", "q2").unwrap();
        assert_eq!(chat.status(), ChatStatus::Loading);
        assert!(!chat.resolve(t, Ok("again".into())));
        assert!(chat.resolve(t2, Ok("a2".into())));
        assert_eq!(chat.answer(), "a2");
    }

    #[test]
    fn reset_discards_in_flight_answer() {
        let mut chat = ChatSession::new();
        let t = chat.ask("Rust", "q1").unwrap();
        chat.reset();
        assert!(!chat.resolve(t, Ok("late".into())));
        assert_eq!(chat.view().status, ChatStatus::Idle);
    }
}
