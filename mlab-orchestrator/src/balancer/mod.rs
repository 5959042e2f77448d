//! Load balancer
//!
//! Chooses which runner executes what. New work goes to the first runner
//! reporting itself available; continuing work goes back to the runner
//! already bound to the job and never to another one. Failed operations are
//! handed to the retry queue.

pub mod context;
pub mod queue;
pub mod registry;
pub mod runner;

pub use context::{ErrorContext, RetryOperation};
pub use queue::{QueueError, RetryQueue};
pub use registry::{RunnerEntry, RunnerRegistry, RunnerSource};
pub use runner::{HttpConnector, Runner, RunnerConnector};

use futures::future::join_all;
use mlab_core::domain::runner::{RunnerAvailability, RunnerInfo};
use mlab_runner_client::RunnerError;

#[derive(Debug, thiserror::Error)]
pub enum BalancerError {
    #[error("No available runner")]
    NoAvailableRunner,

    #[error("No runner {runner_id} found for job {job_id}")]
    RunnerNotFound { runner_id: String, job_id: String },

    #[error("Runner {runner_id} is {availability}, not available")]
    RunnerUnavailable {
        runner_id: String,
        availability: RunnerAvailability,
    },

    #[error("Runner {runner_id} unreachable: {source}")]
    RpcUnavailable {
        runner_id: String,
        #[source]
        source: RunnerError,
    },

    #[error("Runner registry unavailable: {0}")]
    Registry(String),
}

pub struct LoadBalancer {
    registry: RunnerRegistry,
    retry_queue: RetryQueue,
}

impl LoadBalancer {
    pub fn new(registry: RunnerRegistry, retry_queue: RetryQueue) -> Self {
        Self {
            registry,
            retry_queue,
        }
    }

    /// Current runner set; malformed entries are skipped
    pub async fn list_runners(&self) -> Result<Vec<Runner>, BalancerError> {
        self.registry.list_runners().await
    }

    /// Returns the first runner whose status probe answers `available`
    ///
    /// Runners are probed in listing order. A runner that cannot be probed
    /// counts as not available.
    pub async fn pick_available(&self) -> Result<Runner, BalancerError> {
        for runner in self.registry.list_runners().await? {
            match runner.rpc().get_status().await {
                Ok(availability) if availability.is_available() => {
                    tracing::debug!("Picked runner {} at {}", runner.id(), runner.address());
                    return Ok(runner);
                }
                Ok(availability) => {
                    tracing::debug!("Runner {} is {}", runner.id(), availability);
                }
                Err(e) => {
                    tracing::debug!("Runner {} status probe failed: {}", runner.id(), e);
                }
            }
        }

        tracing::info!("No available runner");
        Err(BalancerError::NoAvailableRunner)
    }

    /// Handle for a listed runner, without probing it
    pub async fn find(&self, runner_id: &str) -> Result<Option<Runner>, BalancerError> {
        self.registry.find(runner_id).await
    }

    /// Returns the runner bound to a job, if it is available right now
    ///
    /// # Arguments
    /// * `runner_id` - Runner recorded on the job
    /// * `job_id` - Job the runner is resolved for, for diagnostics
    pub async fn resolve_for_job(
        &self,
        runner_id: &str,
        job_id: &str,
    ) -> Result<Runner, BalancerError> {
        let Some(runner) = self.registry.find(runner_id).await? else {
            tracing::debug!("No runner found for job: {}", job_id);
            return Err(BalancerError::RunnerNotFound {
                runner_id: runner_id.to_string(),
                job_id: job_id.to_string(),
            });
        };

        let availability = match runner.rpc().get_status().await {
            Ok(availability) => availability,
            Err(e) if e.is_unavailable() => {
                return Err(BalancerError::RpcUnavailable {
                    runner_id: runner_id.to_string(),
                    source: e,
                });
            }
            Err(e) => {
                tracing::warn!("Runner {} status probe failed: {}", runner_id, e);
                RunnerAvailability::Offline
            }
        };

        if !availability.is_available() {
            tracing::debug!("Runner: {} status is {}", runner_id, availability);
            return Err(BalancerError::RunnerUnavailable {
                runner_id: runner_id.to_string(),
                availability,
            });
        }

        Ok(runner)
    }

    /// Appends a context to the retry queue
    ///
    /// Never fails: a queueing error is logged and dropped.
    pub async fn enqueue_retry(&self, context: ErrorContext) {
        match self.retry_queue.push(&context).await {
            Ok(()) => tracing::info!(
                "Queued {} of job {} on {} for retry",
                context.operation.name(),
                context.operation.job_id(),
                self.retry_queue.name()
            ),
            Err(e) => tracing::error!(
                "Failed to queue {} of job {} for retry: {}",
                context.operation.name(),
                context.operation.job_id(),
                e
            ),
        }
    }

    /// Every listed runner with its probed availability and connectivity
    ///
    /// Probe failures are reported as offline.
    pub async fn list_runners_with_status(&self) -> Result<Vec<RunnerInfo>, BalancerError> {
        let runners = self.registry.list_runners().await?;
        let probes = runners.iter().map(|runner| async move {
            let (status, connectivity) =
                futures::join!(runner.rpc().get_status(), runner.rpc().connectivity());
            RunnerInfo {
                id: runner.id().to_string(),
                address: runner.address().to_string(),
                availability: status.unwrap_or(RunnerAvailability::Offline),
                connectivity,
            }
        });
        Ok(join_all(probes).await)
    }
}
