//! Runner RPC contract
//!
//! Messages for the unary calls (`CreateTaskEnvironment`, `StopTask`,
//! `RemoveTaskEnvironment`) and the server-streaming `RunTask` call. A run
//! streams [`TaskFrame`]s: captured process output lines and, once the task is
//! finished, one terminal result frame.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::catalog::DatasetKind;

/// A model or dataset as a runner sees it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<DatasetKind>,
}

impl Project {
    /// A repository reference for environment setup
    pub fn checkout(name: impl Into<String>, branch: Option<String>) -> Self {
        Self {
            name: name.into(),
            branch,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTaskEnvironment {
    pub job_id: Uuid,
    pub model: Project,
    pub dataset: Project,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTask {
    pub job_id: Uuid,
    pub task_id: Uuid,
    pub task_name: String,
    pub user_id: String,
    pub base_dir: String,
    pub results_dir: String,
    /// Address runners may call back on
    pub rpc_url: String,
    pub model: Project,
    pub dataset: Project,
    /// Model file to load, test tasks only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trained_model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopTask {
    pub job_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveTaskEnvironment {
    pub job_id: Uuid,
}

/// One element of a `RunTask` response stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskFrame {
    /// A line of captured process output
    Line { line: String },
    /// Structured outcome of the task
    Result(TaskOutcome),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// Empty on placeholder frames; terminal frames carry the task id
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub task_name: String,
    #[serde(default)]
    pub status: OutcomeStatus,
    #[serde(default)]
    pub metrics: Vec<Metric>,
    #[serde(default)]
    pub pretrained_model: Option<String>,
    #[serde(default)]
    pub predictions: Option<serde_json::Value>,
    #[serde(default)]
    pub files: Vec<TaskFile>,
}

impl TaskOutcome {
    pub fn is_terminal(&self) -> bool {
        !self.task_id.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    #[default]
    #[serde(alias = "success", alias = "completed")]
    Done,
    #[serde(alias = "failed")]
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
}

/// An artifact produced by the task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFile {
    pub name: String,
    #[serde(with = "base64_bytes")]
    pub buffer: Vec<u8>,
}

mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
