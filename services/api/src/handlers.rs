//! Axum Handlers for the REST API
//!
//! Stateless passthroughs to the collaborator services, useful on their own
//! and as a way to exercise each generator in isolation. The stateful session
//! lives behind `/ws`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use jedi_core::{FetchError, ValidationError};
use std::sync::Arc;
use tracing::{error, warn};

use crate::{
    models::{
        ChatQuery, ChatResponse, ErrorResponse, GeneratePathQuery, GenerateQuizQuery,
        LearningPathResponse, QuizResponse, VideoSearchResponse, YouTubeSearchQuery,
    },
    state::AppState,
};

/// YouTube rejects larger pages.
const MAX_VIDEO_RESULTS: usize = 50;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// A collaborator failed or answered with something unusable.
    BadGateway(FetchError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::BadGateway(err) => {
                error!(error = %err, "Upstream service failed");
                (
                    StatusCode::BAD_GATEWAY,
                    Json(ErrorResponse {
                        message: err.to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        Self::BadGateway(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        warn!(error = %err, "Rejected request");
        Self::BadRequest(err.to_string())
    }
}

fn non_empty(value: &str, err: ValidationError) -> Result<&str, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(err.into());
    }
    Ok(value)
}

/// Generate a three-phase learning path for a topic.
#[utoipa::path(
    get,
    path = "/generate-path",
    params(GeneratePathQuery),
    responses(
        (status = 200, description = "Learning path generated", body = LearningPathResponse),
        (status = 400, description = "Blank topic", body = ErrorResponse),
        (status = 502, description = "Generator failed or returned malformed data", body = ErrorResponse)
    )
)]
pub async fn generate_path(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GeneratePathQuery>,
) -> Result<Json<LearningPathResponse>, ApiError> {
    let topic = non_empty(&query.topic, ValidationError::EmptyTopic)?;
    let learning_path = state.services.curriculum.generate(topic).await?;
    Ok(Json(LearningPathResponse { learning_path }))
}

/// Search for videos matching a query.
#[utoipa::path(
    get,
    path = "/youtube-search",
    params(YouTubeSearchQuery),
    responses(
        (status = 200, description = "Matching videos", body = VideoSearchResponse),
        (status = 400, description = "Blank query or bad page size", body = ErrorResponse),
        (status = 502, description = "Video provider failed", body = ErrorResponse)
    )
)]
pub async fn youtube_search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<YouTubeSearchQuery>,
) -> Result<Json<VideoSearchResponse>, ApiError> {
    let search = query.query.trim();
    if search.is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".to_string()));
    }
    if !(1..=MAX_VIDEO_RESULTS).contains(&query.max_results) {
        return Err(ApiError::BadRequest(format!(
            "max_results must be between 1 and {MAX_VIDEO_RESULTS}"
        )));
    }
    let mut results = state.services.videos.search(search, query.max_results).await?;
    results.truncate(query.max_results);
    Ok(Json(VideoSearchResponse { results }))
}

/// Generate multiple-choice questions for a subtopic.
#[utoipa::path(
    get,
    path = "/generate-quiz",
    params(GenerateQuizQuery),
    responses(
        (status = 200, description = "Quiz generated", body = QuizResponse),
        (status = 400, description = "Blank subtopic or zero questions", body = ErrorResponse),
        (status = 502, description = "Generator failed or returned malformed data", body = ErrorResponse)
    )
)]
pub async fn generate_quiz(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GenerateQuizQuery>,
) -> Result<Json<QuizResponse>, ApiError> {
    let subtopic = query.subtopic.trim();
    if subtopic.is_empty() {
        return Err(ApiError::BadRequest("subtopic must not be empty".to_string()));
    }
    if query.num_questions == 0 {
        return Err(ApiError::BadRequest(
            "num_questions must be at least 1".to_string(),
        ));
    }
    let quiz = state
        .services
        .quiz
        .generate(subtopic, query.num_questions)
        .await?;
    Ok(Json(QuizResponse { quiz }))
}

/// Ask a question about a topic.
#[utoipa::path(
    get,
    path = "/chat",
    params(ChatQuery),
    responses(
        (status = 200, description = "Answer", body = ChatResponse),
        (status = 400, description = "Blank topic or question", body = ErrorResponse),
        (status = 502, description = "Answerer failed", body = ErrorResponse)
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChatQuery>,
) -> Result<Json<ChatResponse>, ApiError> {
    let topic = non_empty(&query.topic, ValidationError::EmptyTopic)?;
    let question = non_empty(&query.question, ValidationError::EmptyQuestion)?;
    let answer = state.services.chat.answer(topic, question).await?;
    Ok(Json(ChatResponse { answer }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jedi_core::{ControllerSettings, ParseError};

    fn state() -> State<Arc<AppState>> {
        State(Arc::new(AppState::mock(ControllerSettings::default())))
    }

    fn status(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[tokio::test]
    async fn test_generate_path_with_mock_service() {
        let query = GeneratePathQuery {
            topic: "  Rust ".to_string(),
        };
        let Json(response) = generate_path(state(), Query(query)).await.unwrap();
        assert_eq!(response.learning_path.phases.len(), 3);
        assert!(response.learning_path.contains_subtopic("Introduction to Rust"));
    }

    #[tokio::test]
    async fn test_blank_topic_is_bad_request() {
        let query = GeneratePathQuery {
            topic: " ".to_string(),
        };
        let err = generate_path(state(), Query(query)).await.unwrap_err();
        assert_eq!(status(err), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_youtube_search_validates_page_size() {
        let query = YouTubeSearchQuery {
            query: "Rome".to_string(),
            max_results: 0,
        };
        let err = youtube_search(state(), Query(query)).await.unwrap_err();
        assert_eq!(status(err), StatusCode::BAD_REQUEST);

        let query = YouTubeSearchQuery {
            query: "Rome".to_string(),
            max_results: 2,
        };
        let Json(response) = youtube_search(state(), Query(query)).await.unwrap();
        assert_eq!(response.results.len(), 2);
    }

    #[tokio::test]
    async fn test_generate_quiz_and_chat() {
        let query = GenerateQuizQuery {
            subtopic: "Borrowing".to_string(),
            num_questions: 2,
        };
        let Json(response) = generate_quiz(state(), Query(query)).await.unwrap();
        assert_eq!(response.quiz.len(), 2);

        let query = ChatQuery {
            topic: "Rust".to_string(),
            question: "".to_string(),
        };
        let err = chat(state(), Query(query)).await.unwrap_err();
        assert_eq!(status(err), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_fetch_errors_map_to_bad_gateway() {
        let err: ApiError = FetchError::from(ParseError::MissingField("answer")).into();
        assert_eq!(status(err), StatusCode::BAD_GATEWAY);
    }
}
