//! Health Check API Handler
//!
//! Reports liveness and which record store tier is active.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use crate::api::AppState;

/// GET /health
/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "store": state.store.backend().as_str(),
        })),
    )
}
