//! Runner API Handlers

use axum::{Json, extract::State};
use mlab_core::domain::runner::RunnerInfo;

use crate::api::error::ApiResult;
use crate::service::Orchestrator;

/// GET /runners
/// List known runners with their probed availability
pub async fn list_runners(State(orchestrator): State<Orchestrator>) -> ApiResult<Json<Vec<RunnerInfo>>> {
    tracing::debug!("Listing runners");

    let runners = orchestrator.list_runners().await?;
    Ok(Json(runners))
}
