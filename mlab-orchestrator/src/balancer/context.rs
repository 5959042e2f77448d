//! Error contexts
//!
//! An [`ErrorContext`] names a failed operation together with the arguments
//! needed to attempt it again. It travels through the retry queue as JSON
//! bytes; the queue never looks inside.

use chrono::{DateTime, Utc};
use mlab_core::dto::job::{TestRequest, TrainRequest};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The failed operation and the arguments it was called with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "args", rename_all = "snake_case")]
pub enum RetryOperation {
    SetupEnvironment {
        job_id: Uuid,
        model_name: String,
        dataset_name: String,
        model_branch: Option<String>,
        dataset_branch: Option<String>,
    },
    TrainModel {
        job_id: Uuid,
        user_id: String,
        request: TrainRequest,
    },
    TestModel {
        job_id: Uuid,
        user_id: String,
        request: TestRequest,
    },
}

impl RetryOperation {
    /// Symbolic name of the operation
    pub fn name(&self) -> &'static str {
        match self {
            RetryOperation::SetupEnvironment { .. } => "setup_environment",
            RetryOperation::TrainModel { .. } => "train_model",
            RetryOperation::TestModel { .. } => "test_model",
        }
    }

    pub fn job_id(&self) -> Uuid {
        match self {
            RetryOperation::SetupEnvironment { job_id, .. }
            | RetryOperation::TrainModel { job_id, .. }
            | RetryOperation::TestModel { job_id, .. } => *job_id,
        }
    }
}

/// Retry queue payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    pub operation: RetryOperation,
    /// Why the attempt failed
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

impl ErrorContext {
    pub fn new(operation: RetryOperation, reason: impl Into<String>) -> Self {
        Self {
            operation,
            reason: reason.into(),
            failed_at: Utc::now(),
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
