//! Axum Router Configuration
//!
//! REST passthroughs, the WebSocket session endpoint and OpenAPI docs.

use crate::{
    handlers,
    models::{ChatResponse, ErrorResponse, LearningPathResponse, QuizResponse, VideoSearchResponse},
    state::AppState,
    ws::ws_handler,
};

use axum::{Router, routing::get};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::generate_path,
        handlers::youtube_search,
        handlers::generate_quiz,
        handlers::chat,
    ),
    components(
        schemas(LearningPathResponse, VideoSearchResponse, QuizResponse, ChatResponse, ErrorResponse)
    ),
    tags(
        (name = "JEDI API", description = "Learning paths with videos, quizzes and Q&A")
    )
)]
pub struct ApiDoc;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/generate-path", get(handlers::generate_path))
        .route("/youtube-search", get(handlers::youtube_search))
        .route("/generate-quiz", get(handlers::generate_quiz))
        .route("/chat", get(handlers::chat))
        .route("/ws", get(ws_handler))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_rest_route() {
        let doc = ApiDoc::openapi();
        for path in ["/generate-path", "/youtube-search", "/generate-quiz", "/chat"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
