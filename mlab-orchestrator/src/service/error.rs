//! Service errors
//!
//! [`JobError`] is returned synchronously to callers. [`DispatchError`] covers
//! the asynchronous phase, after the caller already got its acknowledgment,
//! and is never returned to a caller: [`DispatchError::recovery`] decides how
//! the job and its result are repaired.

use mlab_runner_client::RunnerError;
use std::time::Duration;
use uuid::Uuid;

use crate::balancer::BalancerError;
use crate::repository::RepositoryError;

/// Service error type
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Job {0} not found")]
    NotFound(Uuid),

    #[error("Model {0} not found")]
    ModelNotFound(Uuid),

    #[error("Dataset {0} not found")]
    DatasetNotFound(Uuid),

    #[error("Result {0} not found")]
    ResultNotFound(Uuid),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Job limit of {0} open jobs reached")]
    JobLimitReached(i64),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Balancer(#[from] BalancerError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Workspace error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure while setting up an environment or running a task
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Balancer(#[from] BalancerError),

    #[error("Runner {runner_id} call failed: {source}")]
    Rpc {
        runner_id: String,
        #[source]
        source: RunnerError,
    },

    /// The run had started when the connection broke
    #[error("Task stream from runner {runner_id} broke: {source}")]
    Stream {
        runner_id: String,
        #[source]
        source: RunnerError,
    },

    #[error("Task did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Task stream ended without a result")]
    ProtocolViolation,

    #[error("Workspace error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// How a failed run is repaired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Runner could not be reached: queue the operation for retry and send
    /// the job back to environment setup
    Requeue,
    /// Runner side failure: record the error on the result, keep the job
    /// usable
    FailResult,
}

impl DispatchError {
    pub fn rpc(runner_id: &str, source: RunnerError) -> Self {
        DispatchError::Rpc {
            runner_id: runner_id.to_string(),
            source,
        }
    }

    pub fn stream(runner_id: &str, source: RunnerError) -> Self {
        DispatchError::Stream {
            runner_id: runner_id.to_string(),
            source,
        }
    }

    /// Whether the failure means the runner could not be reached
    ///
    /// Only failures before the task started count; once a run is under
    /// way a lost connection fails the result instead.
    pub fn is_unreachable(&self) -> bool {
        match self {
            DispatchError::Balancer(_) => true,
            DispatchError::Rpc { source, .. } => source.is_unavailable(),
            _ => false,
        }
    }

    pub fn recovery(&self) -> Recovery {
        if self.is_unreachable() {
            Recovery::Requeue
        } else {
            Recovery::FailResult
        }
    }
}
