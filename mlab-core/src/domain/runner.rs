//! Runner domain model
//!
//! Runners are remote workers reached over RPC. The orchestrator never
//! persists them; availability is probed on demand.

use serde::{Deserialize, Serialize};

/// Availability reported by a runner's status call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerAvailability {
    /// Runner accepts new work
    Available,

    /// Runner is executing a task
    Busy,

    /// Runner reported anything else, or could not be reached
    Offline,
}

impl RunnerAvailability {
    /// Parses the free-form status string runners report.
    pub fn from_status(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "available" => RunnerAvailability::Available,
            "busy" => RunnerAvailability::Busy,
            _ => RunnerAvailability::Offline,
        }
    }

    pub fn is_available(self) -> bool {
        self == RunnerAvailability::Available
    }
}

impl std::fmt::Display for RunnerAvailability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunnerAvailability::Available => write!(f, "available"),
            RunnerAvailability::Busy => write!(f, "busy"),
            RunnerAvailability::Offline => write!(f, "offline"),
        }
    }
}

/// Coarse transport state of a runner connection, for diagnostics only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Ready,
    Unreachable,
}

/// A runner as reported to operators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerInfo {
    pub id: String,
    pub address: String,
    pub availability: RunnerAvailability,
    pub connectivity: Connectivity,
}
