//! Job API Handlers
//!
//! HTTP endpoints for the job lifecycle. Create, train and test answer
//! `202 Accepted` as soon as the request is validated; progress is observed
//! by polling the job and its results.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use mlab_core::domain::job::Job;
use mlab_core::domain::result::TaskResult;
use mlab_core::dto::job::{CreateJob, TestRequest, TrainRequest};
use uuid::Uuid;

use crate::api::Caller;
use crate::api::error::ApiResult;
use crate::service::Orchestrator;

// =============================================================================
// Job Lifecycle Endpoints
// =============================================================================

/// POST /jobs
/// Create a job; its environment is set up in the background
pub async fn create_job(
    State(orchestrator): State<Orchestrator>,
    Caller(user_id): Caller,
    Json(req): Json<CreateJob>,
) -> ApiResult<(StatusCode, Json<Job>)> {
    tracing::info!("Creating job {} for {}", req.name, user_id);

    let accepted = orchestrator.create_job(&user_id, req).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted.value)))
}

/// POST /jobs/{id}/train
pub async fn train(
    State(orchestrator): State<Orchestrator>,
    Caller(user_id): Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<TrainRequest>,
) -> ApiResult<(StatusCode, Json<TaskResult>)> {
    tracing::info!("Train requested on job {}", id);

    let accepted = orchestrator.train(&user_id, id, req).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted.value)))
}

/// POST /jobs/{id}/test
pub async fn test(
    State(orchestrator): State<Orchestrator>,
    Caller(user_id): Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<TestRequest>,
) -> ApiResult<(StatusCode, Json<TaskResult>)> {
    tracing::info!("Test requested on job {}", id);

    let accepted = orchestrator.test(&user_id, id, req).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted.value)))
}

/// POST /jobs/{id}/stop
pub async fn stop(
    State(orchestrator): State<Orchestrator>,
    Caller(user_id): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Job>> {
    tracing::info!("Stop requested on job {}", id);

    let job = orchestrator.stop(&user_id, id).await?;
    Ok(Json(job))
}

/// POST /jobs/{id}/close
pub async fn close(
    State(orchestrator): State<Orchestrator>,
    Caller(user_id): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Job>> {
    tracing::info!("Close requested on job {}", id);

    let job = orchestrator.close(&user_id, id).await?;
    Ok(Json(job))
}

// =============================================================================
// Query Endpoints
// =============================================================================

/// GET /jobs
/// List the caller's open jobs
pub async fn list_jobs(
    State(orchestrator): State<Orchestrator>,
    Caller(user_id): Caller,
) -> ApiResult<Json<Vec<Job>>> {
    tracing::debug!("Listing jobs of {}", user_id);

    let jobs = orchestrator.list_jobs(&user_id).await?;
    Ok(Json(jobs))
}

/// GET /jobs/{id}
pub async fn get_job(
    State(orchestrator): State<Orchestrator>,
    Caller(user_id): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Job>> {
    tracing::debug!("Getting job: {}", id);

    let job = orchestrator.get_job(&user_id, id).await?;
    Ok(Json(job))
}

/// GET /jobs/{id}/results
pub async fn list_results(
    State(orchestrator): State<Orchestrator>,
    Caller(user_id): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<TaskResult>>> {
    tracing::debug!("Listing results of job {}", id);

    let results = orchestrator.list_results(&user_id, id).await?;
    Ok(Json(results))
}

/// GET /results/{id}
pub async fn get_result(
    State(orchestrator): State<Orchestrator>,
    Caller(user_id): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TaskResult>> {
    tracing::debug!("Getting result: {}", id);

    let result = orchestrator.get_result(&user_id, id).await?;
    Ok(Json(result))
}
