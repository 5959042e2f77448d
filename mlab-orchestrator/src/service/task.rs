//! Task runs
//!
//! Drives one train or test run against the job's bound runner: resolve the
//! runner, start the task, relay its output lines into the result log and
//! commit the terminal result frame. Failures are repaired here, since the
//! caller has already been answered.

use chrono::Utc;
use futures::StreamExt;
use mlab_core::domain::job::JobStatus;
use mlab_core::domain::result::{ResultStatus, TaskKind, TaskResult};
use mlab_core::dto::task::{OutcomeStatus, RunTask, StopTask, TaskFrame, TaskOutcome};
use mlab_runner_client::TaskStream;
use std::io;
use uuid::Uuid;

use super::{DispatchError, Orchestrator, Recovery};
use crate::balancer::{ErrorContext, RetryOperation, Runner};
use crate::repository::RepositoryError;

/// Everything a background run needs
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// Runner bound to the job when the run was accepted
    pub runner_id: String,
    /// Result as created, status `running`
    pub result: TaskResult,
    pub request: RunTask,
    /// Operation queued when the runner cannot be reached
    pub retry: RetryOperation,
}

impl Orchestrator {
    /// Run a planned task to completion, repairing state on failure
    pub async fn execute(&self, plan: RunPlan) {
        if let Err(e) = self.dispatch(&plan).await {
            self.recover(&plan, e).await;
        }
    }

    async fn dispatch(&self, plan: &RunPlan) -> Result<(), DispatchError> {
        let job_id = plan.result.job_id;
        let runner = self
            .balancer
            .resolve_for_job(&plan.runner_id, &job_id.to_string())
            .await?;

        tracing::info!(
            "Starting {} {} of job {} on runner {}",
            plan.request.task_name,
            plan.result.id,
            job_id,
            runner.id()
        );

        let limit = self.settings.run_task_timeout;
        match tokio::time::timeout(limit, self.run(&runner, plan)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                if let Err(e) = runner.rpc().stop_task(StopTask { job_id }).await {
                    tracing::warn!("Failed to stop timed out task of job {}: {}", job_id, e);
                }
                Err(DispatchError::Timeout(limit))
            }
        }
    }

    /// Starts the task on `runner` and consumes its stream
    async fn run(&self, runner: &Runner, plan: &RunPlan) -> Result<(), DispatchError> {
        let stream = runner
            .rpc()
            .run_task(plan.request.clone())
            .await
            .map_err(|e| DispatchError::rpc(runner.id(), e))?;

        self.consume(runner.id(), stream, plan).await
    }

    /// Reads the run stream until it ends
    async fn consume(
        &self,
        runner_id: &str,
        mut stream: TaskStream,
        plan: &RunPlan,
    ) -> Result<(), DispatchError> {
        let (job_id, result_id) = (plan.result.job_id, plan.result.id);
        let mut log = self.workspace.open_log(job_id, result_id).await?;
        let mut finished = false;

        while let Some(frame) = stream.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) if finished => {
                    tracing::warn!("Task stream of result {} broke after its result: {}", result_id, e);
                    break;
                }
                Err(e) => return Err(DispatchError::stream(runner_id, e)),
            };

            match frame {
                TaskFrame::Line { line } => log.append(&line).await?,
                TaskFrame::Result(outcome) if outcome.is_terminal() => {
                    self.commit(&plan.result, outcome).await?;
                    finished = true;
                }
                TaskFrame::Result(_) => {
                    tracing::debug!("Ignoring result frame without task id for result {}", result_id);
                }
            }
        }

        if finished {
            Ok(())
        } else {
            Err(DispatchError::ProtocolViolation)
        }
    }

    /// Applies a terminal result frame to a running result
    ///
    /// Artifacts are stored first, then the result is finished with a
    /// compare-and-set on `running`: a second frame for the same result, or
    /// a frame arriving after a stop, changes nothing.
    ///
    /// # Returns
    /// `true` if this frame finished the result
    pub async fn commit(&self, running: &TaskResult, outcome: TaskOutcome) -> Result<bool, DispatchError> {
        let (job_id, result_id) = (running.job_id, running.id);
        if outcome.task_id != result_id.to_string() {
            tracing::warn!(
                "Result frame names task {}, committing it to result {}",
                outcome.task_id,
                result_id
            );
        }

        let mut result = running.clone();
        for file in outcome.files {
            match self
                .workspace
                .write_artifact(job_id, result_id, &file.name, &file.buffer)
                .await
            {
                Ok(name) => result.add_file(name),
                Err(e) if e.kind() == io::ErrorKind::InvalidInput => {
                    tracing::warn!("Skipping artifact of result {}: {}", result_id, e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        result.metrics = outcome
            .metrics
            .into_iter()
            .map(|m| (m.name, m.value))
            .collect();
        match result.kind {
            TaskKind::Train => result.pretrained_model = outcome.pretrained_model,
            TaskKind::Test => result.predictions = outcome.predictions,
        }
        result.status = match outcome.status {
            OutcomeStatus::Done => ResultStatus::Done,
            OutcomeStatus::Error => ResultStatus::Error,
        };
        result.modified_at = Utc::now();

        if !self.stores.results.finish(&result).await? {
            tracing::debug!("Result {} already finished, ignoring result frame", result_id);
            return Ok(false);
        }

        tracing::info!("Result {} of job {} is {}", result_id, job_id, result.status);
        self.release_job(job_id, JobStatus::Ready).await?;
        Ok(true)
    }

    /// Repairs result and job after a failed run
    ///
    /// Whoever finishes the result also releases the job, so nothing happens
    /// when the result was already finished (for example by a stop).
    async fn recover(&self, plan: &RunPlan, error: DispatchError) {
        let (job_id, result_id) = (plan.result.job_id, plan.result.id);
        let recovery = error.recovery();
        tracing::error!("Run {} of job {} failed: {}", result_id, job_id, error);

        let mut failed = plan.result.clone();
        failed.status = ResultStatus::Error;
        failed.modified_at = Utc::now();
        let finished_here = match self.stores.results.finish(&failed).await {
            Ok(finished) => finished,
            Err(e) => {
                tracing::error!("Failed to mark result {} as error: {}", result_id, e);
                true
            }
        };
        if !finished_here {
            tracing::debug!("Result {} already finished, nothing to recover", result_id);
            return;
        }

        let target = match recovery {
            Recovery::Requeue => {
                self.balancer
                    .enqueue_retry(ErrorContext::new(plan.retry.clone(), error.to_string()))
                    .await;
                JobStatus::Initializing
            }
            Recovery::FailResult => {
                if let Err(e) = self
                    .workspace
                    .write_error(job_id, result_id, &error.to_string())
                    .await
                {
                    tracing::warn!("Failed to write error file of result {}: {}", result_id, e);
                }
                JobStatus::Ready
            }
        };

        if let Err(e) = self.release_job(job_id, target).await {
            tracing::error!("Failed to release job {}: {}", job_id, e);
        }
    }

    /// Moves an OCCUPIED job to `target`
    ///
    /// Jobs in any other state were already moved by someone else and are
    /// left alone. The runner stays recorded on the job, since its
    /// environment still lives there.
    async fn release_job(&self, job_id: Uuid, target: JobStatus) -> Result<(), RepositoryError> {
        let Some(mut job) = self.stores.jobs.find_by_id(job_id).await? else {
            tracing::warn!("Job {} disappeared while running", job_id);
            return Ok(());
        };
        if job.status != JobStatus::Occupied {
            tracing::debug!("Job {} is {}, leaving it as is", job_id, job.status);
            return Ok(());
        }

        if let Err((from, to)) = job.transition(target) {
            tracing::warn!("Job {} cannot move from {} to {}", job_id, from, to);
            return Ok(());
        }
        self.stores.jobs.update(&job).await?;

        tracing::info!("Job {} is {}", job_id, job.status);
        Ok(())
    }
}
