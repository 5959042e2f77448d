//! Job DTOs
//!
//! Requests accepted by the orchestrator for the job lifecycle.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::catalog::DatasetKind;

/// Request to create a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub model_id: Uuid,
    pub dataset_id: Uuid,
    /// Overrides for the model's default parameters
    #[serde(default)]
    pub parameters: Option<HashMap<String, serde_json::Value>>,
}

/// Request to train the job's model on the job's dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainRequest {
    pub name: String,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub model_branch: Option<String>,
    #[serde(default)]
    pub dataset_branch: Option<String>,
}

/// Request to test a model against a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRequest {
    pub name: String,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
    pub model: UseModel,
    pub dataset: UseDataset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseModel {
    #[serde(flatten)]
    pub source: ModelSource,
    #[serde(default)]
    pub branch: Option<String>,
}

/// Which trained model a test run loads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelSource {
    /// The model file shipped with the model repository
    Default,
    /// The output of a finished train result of the same job
    Pretrained { result_id: Uuid },
    /// A user supplied model file; not supported yet
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseDataset {
    #[serde(rename = "type", default)]
    pub kind: DatasetKind,
    #[serde(default)]
    pub branch: Option<String>,
    /// Upload path relative to the job's uploads area
    #[serde(default)]
    pub path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_source_from_json() {
        let model: UseModel = serde_json::from_value(serde_json::json!({
            "type": "pretrained",
            "result_id": "6f1c1a54-3f4e-4a4b-9f4d-3c1f8a9e2b10",
            "branch": "main"
        }))
        .unwrap();
        assert!(matches!(model.source, ModelSource::Pretrained { .. }));
        assert_eq!(model.branch.as_deref(), Some("main"));

        let model: UseModel =
            serde_json::from_value(serde_json::json!({ "type": "custom" })).unwrap();
        assert_eq!(model.source, ModelSource::Custom);
    }

    #[test]
    fn test_dataset_defaults() {
        let dataset: UseDataset = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(dataset.kind, DatasetKind::Default);
        assert!(dataset.path.is_none());
    }
}
