//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod health;
pub mod job;
pub mod runner;

use axum::{
    Router,
    extract::FromRequestParts,
    http::request::Parts,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::api::error::ApiError;
use crate::service::Orchestrator;

/// Header carrying the authenticated user id
pub const USER_HEADER: &str = "x-user-id";

/// Id of the user making the request
///
/// Authentication happens in front of the orchestrator; a request without
/// the user header is rejected with `401`.
#[derive(Debug, Clone)]
pub struct Caller(pub String);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|user| !user.is_empty())
            .map(|user| Caller(user.to_string()))
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {} header", USER_HEADER)))
    }
}

/// Create the main API router with all endpoints
pub fn create_router(orchestrator: Orchestrator) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Job endpoints
        .route("/jobs", post(job::create_job).get(job::list_jobs))
        .route("/jobs/{id}", get(job::get_job))
        .route("/jobs/{id}/results", get(job::list_results))
        .route("/jobs/{id}/train", post(job::train))
        .route("/jobs/{id}/test", post(job::test))
        .route("/jobs/{id}/stop", post(job::stop))
        .route("/jobs/{id}/close", post(job::close))
        .route("/results/{id}", get(job::get_result))
        // Runner endpoints
        .route("/runners", get(runner::list_runners))
        // Add state and middleware
        .with_state(orchestrator)
        .layer(TraceLayer::new_for_http())
}
