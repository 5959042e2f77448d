//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::service::JobError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    ServiceUnavailable(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::ServiceUnavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        let message = err.to_string();
        match err {
            JobError::NotFound(_)
            | JobError::ModelNotFound(_)
            | JobError::DatasetNotFound(_)
            | JobError::ResultNotFound(_) => ApiError::NotFound(message),
            JobError::PermissionDenied => ApiError::Forbidden(message),
            JobError::InvalidState(_)
            | JobError::JobLimitReached(_)
            | JobError::NotSupported(_)
            | JobError::Validation(_) => ApiError::BadRequest(message),
            JobError::Balancer(_) => ApiError::ServiceUnavailable(message),
            JobError::Repository(_) | JobError::Io(_) => ApiError::InternalError(message),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn status_of(err: JobError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_job_error_status_codes() {
        assert_eq!(status_of(JobError::NotFound(Uuid::nil())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(JobError::PermissionDenied), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(JobError::InvalidState("occupied".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(JobError::JobLimitReached(30)), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(JobError::NotSupported("custom".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(JobError::Repository(crate::repository::RepositoryError::Corrupt(
                "bad row".into()
            ))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
