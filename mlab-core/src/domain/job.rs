//! Job domain types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A user-created binding of a model and a dataset
///
/// The orchestrator mutates a job at every lifecycle step. Jobs are never
/// deleted; closing is a terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub owner_id: String,
    pub model_id: Uuid,
    pub model_name: String,
    pub dataset_id: Uuid,
    /// Runner holding this job's environment, bound once setup succeeds
    pub runner_id: Option<String>,
    pub parameters: HashMap<String, serde_json::Value>,
    pub status: JobStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub modified_at: chrono::DateTime<chrono::Utc>,
}

impl Job {
    /// Moves the job to `next`, refreshing `modified_at`.
    ///
    /// Returns the rejected pair when the edge is not part of the lifecycle.
    pub fn transition(&mut self, next: JobStatus) -> Result<(), (JobStatus, JobStatus)> {
        if !self.status.can_transition_to(next) {
            return Err((self.status, next));
        }
        self.status = next;
        self.modified_at = chrono::Utc::now();
        Ok(())
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }
}

/// Job lifecycle status
///
/// `Initializing -> Ready -> Occupied -> Ready -> Closed`, with a rollback
/// edge back to `Initializing` when the bound runner can no longer be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Initializing,
    Ready,
    Occupied,
    Closed,
}

impl JobStatus {
    /// Whether `self -> next` is an edge of the lifecycle.
    ///
    /// Staying in the same non-terminal state is allowed (stopping an idle job).
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Closed, _) => false,
            (a, b) if a == b => true,
            (Initializing, Ready) => true,
            (Ready, Occupied) | (Ready, Closed) | (Ready, Initializing) => true,
            (Occupied, Ready) | (Occupied, Initializing) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Initializing => "INITIALIZING",
            JobStatus::Ready => "READY",
            JobStatus::Occupied => "OCCUPIED",
            JobStatus::Closed => "CLOSED",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INITIALIZING" => Ok(JobStatus::Initializing),
            "READY" => Ok(JobStatus::Ready),
            "OCCUPIED" => Ok(JobStatus::Occupied),
            "CLOSED" => Ok(JobStatus::Closed),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}
