//! Service Module
//!
//! Business logic layer for the orchestrator.
//! The [`Orchestrator`] owns the job/result state machine: it validates
//! requests against the repositories, asks the load balancer for runners and
//! drives the runner RPCs in background tasks.

pub mod error;
pub mod job;
pub mod task;

pub use error::{DispatchError, JobError, Recovery};

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::balancer::LoadBalancer;
use crate::config::Config;
use crate::repository::{CatalogRepository, JobRepository, ResultRepository};
use crate::workspace::Workspace;

/// Repositories the orchestrator reads and writes
#[derive(Clone)]
pub struct Stores {
    pub jobs: Arc<dyn JobRepository>,
    pub results: Arc<dyn ResultRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
}

/// Tunables of the orchestrator
#[derive(Debug, Clone)]
pub struct Settings {
    /// Maximum number of open jobs per owner
    pub job_limit: i64,
    /// Upper bound for a whole run, from the run-task call to the end of its stream
    pub run_task_timeout: Duration,
    /// Upper bound for a create-environment call
    pub setup_timeout: Duration,
    /// Callback address forwarded to runners
    pub rpc_url: String,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            job_limit: config.job_limit,
            run_task_timeout: config.run_task_timeout,
            setup_timeout: config.setup_timeout,
            rpc_url: config.rpc_url.clone(),
        }
    }
}

/// An accepted request whose work continues in the background
///
/// Dropping `task` detaches the work; awaiting it waits for the background
/// phase, including its failure handling, to finish.
#[derive(Debug)]
pub struct Accepted<T> {
    pub value: T,
    pub task: JoinHandle<()>,
}

#[derive(Clone)]
pub struct Orchestrator {
    stores: Stores,
    balancer: Arc<LoadBalancer>,
    workspace: Workspace,
    settings: Settings,
}

impl Orchestrator {
    pub fn new(
        stores: Stores,
        balancer: Arc<LoadBalancer>,
        workspace: Workspace,
        settings: Settings,
    ) -> Self {
        Self {
            stores,
            balancer,
            workspace,
            settings,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }
}
