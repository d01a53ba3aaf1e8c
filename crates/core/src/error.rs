//! Error types for the orchestration core.
//!
//! Collaborator adapters report [`FetchError`]; malformed payloads are
//! [`ParseError`]s wrapped inside it. Operations rejected before any request
//! is issued report [`ValidationError`].

use thiserror::Error;

/// A response that reached us but did not have the expected shape.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("{0}")]
    Invalid(String),
}

impl ParseError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// Any failure talking to an external collaborator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{service} returned status {status}")]
    Status {
        service: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("llm request failed: {0}")]
    Llm(#[from] async_openai::error::OpenAIError),
    #[error("malformed response: {0}")]
    Parse(#[from] ParseError),
}

/// Operation arguments or session state that make a request pointless.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("topic must not be empty")]
    EmptyTopic,
    #[error("question must not be empty")]
    EmptyQuestion,
    #[error("no topic has been loaded")]
    NoTopic,
    #[error("subtopic '{0}' is not part of the current learning path")]
    UnknownSubtopic(String),
    #[error("no quiz is ready for answers")]
    QuizNotReady,
    #[error("question index {0} is out of range")]
    QuestionOutOfRange(usize),
    #[error("'{0}' is not one of the options")]
    UnknownOption(String),
}

/// Errors surfaced by `load_path`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to fetch learning path: {0}")]
    Fetch(#[from] FetchError),
}
