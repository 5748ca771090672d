// HTTP server module
// Thin front end over the retrieval engine and completion client

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::generation::CompletionClient;
use crate::retrieval::{DEFAULT_TOP_K, RetrievalEngine};
use crate::{RagError, Result};

/// Canned reply for queries the relevance gate rejects
pub const OFF_TOPIC_RESPONSE: &str =
    "Your query does not seem related to depression drug recommendations. Please rephrase.";

/// Shared, read-only state behind the HTTP handlers.
///
/// The engine and client are constructed once at startup; concurrent
/// requests share them without locking because nothing here is mutable.
pub struct AppState {
    pub engine: RetrievalEngine,
    pub completion: CompletionClient,
}

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub response: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub reviews: usize,
    pub embedding_model: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/recommend", post(recommend))
        .with_state(state)
}

/// Bind and serve until the process is stopped
#[inline]
pub async fn serve(state: Arc<AppState>, port: u16) -> Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    info!("HTTP server listening on 127.0.0.1:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        reviews: state.engine.review_count(),
        embedding_model: state.engine.embedding_model().to_string(),
    })
}

async fn recommend(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RecommendRequest>,
) -> std::result::Result<Json<RecommendResponse>, (StatusCode, Json<ErrorResponse>)> {
    let query = request.query.trim().to_string();
    if query.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                detail: "Query must not be empty".to_string(),
            }),
        ));
    }

    let is_related = state
        .completion
        .classify_relevance(&query)
        .map_err(internal_error)?;

    if !is_related {
        return Ok(Json(RecommendResponse {
            response: OFF_TOPIC_RESPONSE.to_string(),
        }));
    }

    let answer = state
        .engine
        .answer(&state.completion, &query, DEFAULT_TOP_K)
        .await
        .map_err(internal_error)?;

    Ok(Json(RecommendResponse { response: answer }))
}

fn internal_error(error: RagError) -> (StatusCode, Json<ErrorResponse>) {
    error!("Request failed: {}", error);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            detail: format!("An error occurred: {}", error),
        }),
    )
}
