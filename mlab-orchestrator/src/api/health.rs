//! Health Check API Handler
//!
//! Liveness of the orchestrator process itself; runners are not probed.

use axum::{http::StatusCode, response::IntoResponse};

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
