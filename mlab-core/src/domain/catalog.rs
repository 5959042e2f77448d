//! Model and dataset catalog records
//!
//! The catalog is owned by other parts of the platform; the orchestrator only
//! reads these records to resolve what a job runs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: Uuid,
    pub name: String,
    /// Repository name the runner clones
    pub git_name: String,
    pub owner_id: String,
    pub private: bool,
    /// Default training parameters, overridden per job
    pub parameters: HashMap<String, serde_json::Value>,
    /// Model file shipped with the repository, used by default tests
    pub default_model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: Uuid,
    pub name: String,
    pub git_name: String,
    pub owner_id: String,
    pub private: bool,
}

/// Where a dataset handed to a runner comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    /// The job's own dataset checkout
    #[default]
    Default,
    /// A file uploaded into the job workspace
    Upload,
}

impl DatasetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DatasetKind::Default => "default",
            DatasetKind::Upload => "upload",
        }
    }
}

impl std::str::FromStr for DatasetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(DatasetKind::Default),
            "upload" => Ok(DatasetKind::Upload),
            other => Err(format!("unknown dataset kind: {}", other)),
        }
    }
}

/// A catalog record is visible to its owner, and to everyone when public.
pub fn is_visible_to(private: bool, owner_id: &str, user_id: &str) -> bool {
    !private || owner_id == user_id
}

impl Model {
    pub fn is_visible_to(&self, user_id: &str) -> bool {
        is_visible_to(self.private, &self.owner_id, user_id)
    }
}

impl Dataset {
    pub fn is_visible_to(&self, user_id: &str) -> bool {
        is_visible_to(self.private, &self.owner_id, user_id)
    }
}
