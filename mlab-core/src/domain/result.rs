//! Task result domain types
//!
//! A task result is one train or test attempt under a job. It is created with
//! status `running` when the run is dispatched and finished exactly once.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::domain::catalog::DatasetKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Also the task id sent to the runner
    pub id: Uuid,
    pub job_id: Uuid,
    pub name: String,
    pub kind: TaskKind,
    pub status: ResultStatus,
    pub owner_id: String,
    pub dataset_id: Uuid,
    pub dataset_kind: DatasetKind,
    pub parameters: HashMap<String, serde_json::Value>,
    pub metrics: BTreeMap<String, f64>,
    /// Artifact file names stored in the result directory
    pub files: Vec<String>,
    /// Trained model file, train results only
    pub pretrained_model: Option<String>,
    /// Test results only
    pub predictions: Option<serde_json::Value>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub modified_at: chrono::DateTime<chrono::Utc>,
}

impl TaskResult {
    pub fn is_running(&self) -> bool {
        self.status == ResultStatus::Running
    }

    /// Records an artifact name once, keeping insertion order.
    pub fn add_file(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.files.contains(&name) {
            self.files.push(name);
        }
    }
}

/// Which kind of task produced the result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Train,
    Test,
}

impl TaskKind {
    /// Task name understood by runners
    pub fn task_name(self) -> &'static str {
        match self {
            TaskKind::Train => "mlab.train",
            TaskKind::Test => "mlab.test",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Train => "train",
            TaskKind::Test => "test",
        }
    }
}

impl std::str::FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(TaskKind::Train),
            "test" => Ok(TaskKind::Test),
            other => Err(format!("unknown task kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Running,
    Done,
    Error,
    Stopped,
}

impl ResultStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultStatus::Running => "running",
            ResultStatus::Done => "done",
            ResultStatus::Error => "error",
            ResultStatus::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResultStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(ResultStatus::Running),
            "done" => Ok(ResultStatus::Done),
            "error" => Ok(ResultStatus::Error),
            "stopped" => Ok(ResultStatus::Stopped),
            other => Err(format!("unknown result status: {}", other)),
        }
    }
}
