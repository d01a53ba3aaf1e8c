//! API Models
//!
//! Query and response payloads for the REST endpoints, documented with
//! `utoipa`. Core types are carried as-is; their schema is given as a plain
//! object since the core crate does not depend on `utoipa`.

use jedi_core::curriculum::Curriculum;
use jedi_core::enrichment::DEFAULT_MAX_RESULTS;
use jedi_core::quiz::{DEFAULT_QUIZ_QUESTIONS, QuizQuestion};
use jedi_core::video::VideoResult;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
pub struct GeneratePathQuery {
    /// The subject to build a learning path for.
    #[param(example = "Ancient History")]
    pub topic: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct YouTubeSearchQuery {
    #[param(example = "Rust ownership")]
    pub query: String,
    #[serde(default = "default_max_results")]
    #[param(default = 3)]
    pub max_results: usize,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct GenerateQuizQuery {
    #[param(example = "Borrowing")]
    pub subtopic: String,
    #[serde(default = "default_num_questions")]
    #[param(default = 3)]
    pub num_questions: usize,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ChatQuery {
    pub topic: String,
    pub question: String,
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

fn default_num_questions() -> usize {
    DEFAULT_QUIZ_QUESTIONS
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LearningPathResponse {
    /// Phase key to ordered subtopic entries, in generation order.
    #[schema(value_type = Object)]
    pub learning_path: Curriculum,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VideoSearchResponse {
    #[schema(value_type = Vec<Object>)]
    pub results: Vec<VideoResult>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QuizResponse {
    #[schema(value_type = Vec<Object>)]
    pub quiz: Vec<QuizQuestion>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatResponse {
    pub answer: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use jedi_core::curriculum::{Phase, SubtopicEntry};

    #[test]
    fn test_query_defaults() {
        let search: YouTubeSearchQuery = serde_json::from_str(r#"{"query": "Rome"}"#).unwrap();
        assert_eq!(search.max_results, 3);

        let quiz: GenerateQuizQuery = serde_json::from_str(r#"{"subtopic": "Rome"}"#).unwrap();
        assert_eq!(quiz.num_questions, 3);
    }

    #[test]
    fn test_chat_query_requires_both_fields() {
        let result: Result<ChatQuery, _> = serde_json::from_str(r#"{"topic": "Rust"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_learning_path_keeps_phase_order() {
        let entry = |name: &str| SubtopicEntry {
            subtopic: name.to_string(),
            description: String::new(),
            resources: vec![],
        };
        let response = LearningPathResponse {
            learning_path: Curriculum::new(vec![
                Phase {
                    key: "Phase 2".into(),
                    entries: vec![entry("b")],
                },
                Phase {
                    key: "Phase 1".into(),
                    entries: vec![entry("a")],
                },
            ]),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.starts_with(r#"{"learning_path":{"Phase 2":"#));
        assert!(json.find("Phase 2").unwrap() < json.find("Phase 1").unwrap());
    }

    #[test]
    fn test_error_response_serialization() {
        let error = ErrorResponse {
            message: "topic must not be empty".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&error).unwrap(),
            r#"{"message":"topic must not be empty"}"#
        );
    }
}
