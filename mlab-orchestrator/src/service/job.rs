//! Job Service
//!
//! Business logic for the job lifecycle: create, train, test, stop and
//! close, plus the owner scoped queries.

use chrono::Utc;
use mlab_core::domain::catalog::{Dataset, DatasetKind, Model};
use mlab_core::domain::job::{Job, JobStatus};
use mlab_core::domain::result::{ResultStatus, TaskKind, TaskResult};
use mlab_core::domain::runner::RunnerInfo;
use mlab_core::dto::job::{CreateJob, ModelSource, TestRequest, TrainRequest};
use mlab_core::dto::task::{
    CreateTaskEnvironment, Project, RemoveTaskEnvironment, RunTask, StopTask,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::task::RunPlan;
use super::{Accepted, DispatchError, JobError, Orchestrator};
use crate::balancer::{ErrorContext, RetryOperation};

impl Orchestrator {
    // =========================================================================
    // Create / Setup
    // =========================================================================

    /// Create a job and set up its environment in the background
    ///
    /// # Arguments
    /// * `user_id` - Caller, becomes the job owner
    /// * `req` - Model, dataset and parameter overrides
    pub async fn create_job(&self, user_id: &str, req: CreateJob) -> Result<Accepted<Job>, JobError> {
        validate_name(&req.name, MAX_JOB_NAME)?;
        validate_description(&req.description)?;

        let model = self
            .stores
            .catalog
            .find_model(req.model_id)
            .await?
            .filter(|m| m.is_visible_to(user_id))
            .ok_or(JobError::ModelNotFound(req.model_id))?;
        let dataset = self
            .stores
            .catalog
            .find_dataset(req.dataset_id)
            .await?
            .filter(|d| d.is_visible_to(user_id))
            .ok_or(JobError::DatasetNotFound(req.dataset_id))?;

        let open_jobs = self.stores.jobs.count_open_by_owner(user_id).await?;
        if open_jobs >= self.settings.job_limit {
            return Err(JobError::JobLimitReached(self.settings.job_limit));
        }

        let mut parameters = model.parameters.clone();
        parameters.extend(req.parameters.unwrap_or_default());

        let now = Utc::now();
        let job = Job {
            id: Uuid::new_v4(),
            name: req.name.trim().to_string(),
            description: req.description,
            owner_id: user_id.to_string(),
            model_id: model.id,
            model_name: model.name.clone(),
            dataset_id: dataset.id,
            runner_id: None,
            parameters,
            status: JobStatus::Initializing,
            created_at: now,
            modified_at: now,
        };
        self.stores.jobs.create(&job).await?;

        tracing::info!(
            "Job created: {} for model {} and dataset {}",
            job.id,
            model.git_name,
            dataset.git_name
        );

        let this = self.clone();
        let job_id = job.id;
        let task = tokio::spawn(async move {
            this.setup_environment(job_id, model.git_name, dataset.git_name, None, None)
                .await;
        });

        Ok(Accepted { value: job, task })
    }

    /// Prepare a job's environment on the first available runner
    ///
    /// On success the runner is bound to the job and the job becomes READY.
    /// Any failure queues the setup for retry and leaves the job INITIALIZING.
    pub async fn setup_environment(
        &self,
        job_id: Uuid,
        model_name: String,
        dataset_name: String,
        model_branch: Option<String>,
        dataset_branch: Option<String>,
    ) {
        let request = CreateTaskEnvironment {
            job_id,
            model: Project::checkout(&model_name, model_branch.clone()),
            dataset: Project::checkout(&dataset_name, dataset_branch.clone()),
        };

        match self.create_environment(request).await {
            Ok(runner_id) => match self.bind_runner(job_id, &runner_id).await {
                Ok(_) => tracing::info!("Job {} ready on runner {}", job_id, runner_id),
                Err(e) => tracing::error!(
                    "Failed to bind runner {} to job {}: {}",
                    runner_id,
                    job_id,
                    e
                ),
            },
            Err(e) => {
                tracing::error!("Environment setup for job {} failed: {}", job_id, e);
                let operation = RetryOperation::SetupEnvironment {
                    job_id,
                    model_name,
                    dataset_name,
                    model_branch,
                    dataset_branch,
                };
                self.balancer
                    .enqueue_retry(ErrorContext::new(operation, e.to_string()))
                    .await;
            }
        }
    }

    async fn create_environment(&self, request: CreateTaskEnvironment) -> Result<String, DispatchError> {
        let runner = self.balancer.pick_available().await?;
        let limit = self.settings.setup_timeout;
        tokio::time::timeout(limit, runner.rpc().create_task_environment(request))
            .await
            .map_err(|_| DispatchError::Timeout(limit))?
            .map_err(|e| DispatchError::rpc(runner.id(), e))?;
        Ok(runner.id().to_string())
    }

    async fn bind_runner(&self, job_id: Uuid, runner_id: &str) -> Result<Job, JobError> {
        let mut job = self.load_job(job_id).await?;
        job.runner_id = Some(runner_id.to_string());
        job.transition(JobStatus::Ready).map_err(invalid_transition)?;
        self.stores.jobs.update(&job).await?;
        Ok(job)
    }

    // =========================================================================
    // Train / Test
    // =========================================================================

    /// Train the job's model on the job's dataset
    ///
    /// Returns the created result (status `running`) immediately; the run
    /// continues in the background.
    pub async fn train(
        &self,
        user_id: &str,
        job_id: Uuid,
        req: TrainRequest,
    ) -> Result<Accepted<TaskResult>, JobError> {
        validate_name(&req.name, MAX_RESULT_NAME)?;
        let mut job = self.owned_job(job_id, user_id).await?;
        let runner_id = bound_ready_runner(&job)?;
        let model = self.model_of(&job).await?;
        let dataset = self.dataset_of(&job).await?;

        let model_project = Project {
            name: model.git_name.clone(),
            branch: req.model_branch.clone(),
            path: Some(path_string(self.workspace.model_dir(job.id, &model.git_name))),
            kind: None,
        };
        let dataset_project = Project {
            name: dataset.git_name.clone(),
            branch: req.dataset_branch.clone(),
            path: Some(path_string(self.workspace.dataset_dir(job.id, &dataset.git_name))),
            kind: Some(DatasetKind::Default),
        };

        let result = new_result(
            &job,
            TaskKind::Train,
            &req.name,
            DatasetKind::Default,
            &req.parameters,
        );
        let retry = RetryOperation::TrainModel {
            job_id,
            user_id: user_id.to_string(),
            request: req,
        };

        self.start_run(&mut job, runner_id, result, model_project, dataset_project, None, retry)
            .await
    }

    /// Test a model of the job against its dataset or an uploaded file
    pub async fn test(
        &self,
        user_id: &str,
        job_id: Uuid,
        req: TestRequest,
    ) -> Result<Accepted<TaskResult>, JobError> {
        validate_name(&req.name, MAX_RESULT_NAME)?;
        let mut job = self.owned_job(job_id, user_id).await?;
        let runner_id = bound_ready_runner(&job)?;
        let model = self.model_of(&job).await?;
        let model_dir = self.workspace.model_dir(job.id, &model.git_name);

        let trained_model = match &req.model.source {
            ModelSource::Default => model_dir.join(&model.default_model),
            ModelSource::Pretrained { result_id } => {
                self.pretrained_model_path(&job, *result_id).await?
            }
            ModelSource::Custom => {
                return Err(JobError::NotSupported(
                    "custom models are not supported".to_string(),
                ));
            }
        };

        let dataset_project = match req.dataset.kind {
            DatasetKind::Default => {
                let dataset = self.dataset_of(&job).await?;
                Project {
                    path: Some(path_string(self.workspace.dataset_dir(job.id, &dataset.git_name))),
                    name: dataset.git_name,
                    branch: req.dataset.branch.clone(),
                    kind: Some(DatasetKind::Default),
                }
            }
            DatasetKind::Upload => {
                let relative = req
                    .dataset
                    .path
                    .as_deref()
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .ok_or_else(|| {
                        JobError::Validation("uploaded datasets need a path".to_string())
                    })?;
                let path = self.workspace.upload_path(job.id, relative).ok_or_else(|| {
                    JobError::Validation(format!("invalid upload path: {}", relative))
                })?;
                Project {
                    name: relative.to_string(),
                    branch: None,
                    path: Some(path_string(path)),
                    kind: Some(DatasetKind::Upload),
                }
            }
        };

        let model_project = Project {
            name: model.git_name.clone(),
            branch: req.model.branch.clone(),
            path: Some(path_string(model_dir)),
            kind: None,
        };

        let result = new_result(
            &job,
            TaskKind::Test,
            &req.name,
            req.dataset.kind,
            &req.parameters,
        );
        let retry = RetryOperation::TestModel {
            job_id,
            user_id: user_id.to_string(),
            request: req,
        };

        self.start_run(
            &mut job,
            runner_id,
            result,
            model_project,
            dataset_project,
            Some(path_string(trained_model)),
            retry,
        )
        .await
    }

    /// Model file produced by a finished train result of the same job
    async fn pretrained_model_path(&self, job: &Job, result_id: Uuid) -> Result<PathBuf, JobError> {
        let trained = self
            .stores
            .results
            .find_by_id(result_id)
            .await?
            .filter(|r| r.job_id == job.id)
            .ok_or(JobError::ResultNotFound(result_id))?;

        if trained.kind != TaskKind::Train || trained.status != ResultStatus::Done {
            return Err(JobError::InvalidState(format!(
                "result {} is not a finished train result",
                result_id
            )));
        }
        let model_file = trained.pretrained_model.as_deref().ok_or_else(|| {
            JobError::InvalidState(format!("result {} has no trained model", result_id))
        })?;

        Ok(self.workspace.result_dir(job.id, trained.id).join(model_file))
    }

    /// Persist the result, occupy the job and spawn the run
    #[allow(clippy::too_many_arguments)]
    async fn start_run(
        &self,
        job: &mut Job,
        runner_id: String,
        result: TaskResult,
        model: Project,
        dataset: Project,
        trained_model: Option<String>,
        retry: RetryOperation,
    ) -> Result<Accepted<TaskResult>, JobError> {
        let results_dir = self.workspace.create_result_dir(job.id, result.id).await?;

        job.transition(JobStatus::Occupied).map_err(invalid_transition)?;
        self.stores.results.create(&result).await?;
        self.stores.jobs.update(job).await?;

        let request = RunTask {
            job_id: job.id,
            task_id: result.id,
            task_name: result.kind.task_name().to_string(),
            user_id: job.owner_id.clone(),
            base_dir: path_string(self.workspace.job_dir(job.id)),
            results_dir: path_string(results_dir),
            rpc_url: self.settings.rpc_url.clone(),
            model,
            dataset,
            trained_model,
        };

        tracing::info!(
            "Job {} occupied by {} result {}",
            job.id,
            result.kind.as_str(),
            result.id
        );

        let plan = RunPlan {
            runner_id,
            result: result.clone(),
            request,
            retry,
        };
        let this = self.clone();
        let task = tokio::spawn(async move { this.execute(plan).await });

        Ok(Accepted {
            value: result,
            task,
        })
    }

    // =========================================================================
    // Stop / Close
    // =========================================================================

    /// Stop whatever the job is running
    ///
    /// The runner is asked to terminate the task, running results become
    /// `stopped` and the job returns to READY. A runner that cannot be
    /// reached does not block the stop.
    pub async fn stop(&self, user_id: &str, job_id: Uuid) -> Result<Job, JobError> {
        let mut job = self.owned_job(job_id, user_id).await?;
        let runner_id = match (job.status, job.runner_id.clone()) {
            (JobStatus::Ready | JobStatus::Occupied, Some(runner_id)) => runner_id,
            (status, _) => {
                return Err(JobError::InvalidState(format!(
                    "job {} is {} and has no runner to stop",
                    job_id, status
                )));
            }
        };

        match self.balancer.find(&runner_id).await {
            Ok(Some(runner)) => {
                if let Err(e) = runner.rpc().stop_task(StopTask { job_id }).await {
                    tracing::warn!("Stop request to runner {} for job {} failed: {}", runner_id, job_id, e);
                }
            }
            Ok(None) => tracing::warn!("Runner {} of job {} is no longer listed", runner_id, job_id),
            Err(e) => tracing::warn!("Cannot reach runner {} of job {}: {}", runner_id, job_id, e),
        }

        let running = self
            .stores
            .results
            .find_by_job_and_status(job_id, ResultStatus::Running)
            .await?;
        for mut result in running {
            result.status = ResultStatus::Stopped;
            result.modified_at = Utc::now();
            if self.stores.results.finish(&result).await? {
                tracing::info!("Result {} of job {} stopped", result.id, job_id);
            }
        }

        job.transition(JobStatus::Ready).map_err(invalid_transition)?;
        self.stores.jobs.update(&job).await?;

        tracing::info!("Job {} stopped", job_id);
        Ok(job)
    }

    /// Close a READY job with no running results
    ///
    /// Closing is terminal. The runner is asked to remove the environment on
    /// a best-effort basis.
    pub async fn close(&self, user_id: &str, job_id: Uuid) -> Result<Job, JobError> {
        let mut job = self.owned_job(job_id, user_id).await?;
        if job.status != JobStatus::Ready {
            return Err(JobError::InvalidState(format!(
                "job {} is {}, only READY jobs can be closed",
                job_id, job.status
            )));
        }

        let running = self
            .stores
            .results
            .find_by_job_and_status(job_id, ResultStatus::Running)
            .await?;
        if !running.is_empty() {
            return Err(JobError::InvalidState(format!(
                "job {} has {} running results",
                job_id,
                running.len()
            )));
        }

        if let Some(runner_id) = job.runner_id.as_deref() {
            match self.balancer.find(runner_id).await {
                Ok(Some(runner)) => {
                    if let Err(e) = runner
                        .rpc()
                        .remove_task_environment(RemoveTaskEnvironment { job_id })
                        .await
                    {
                        tracing::warn!(
                            "Failed to remove environment of job {} on runner {}: {}",
                            job_id,
                            runner_id,
                            e
                        );
                    }
                }
                Ok(None) => tracing::warn!("Runner {} of job {} is no longer listed", runner_id, job_id),
                Err(e) => tracing::warn!("Cannot reach runner {} of job {}: {}", runner_id, job_id, e),
            }
        }

        job.transition(JobStatus::Closed).map_err(invalid_transition)?;
        self.stores.jobs.update(&job).await?;

        tracing::info!("Job {} closed", job_id);
        Ok(job)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Get a job owned by the caller
    pub async fn get_job(&self, user_id: &str, job_id: Uuid) -> Result<Job, JobError> {
        self.owned_job(job_id, user_id).await
    }

    /// List the caller's open jobs, newest first
    pub async fn list_jobs(&self, user_id: &str) -> Result<Vec<Job>, JobError> {
        Ok(self.stores.jobs.list_open_by_owner(user_id).await?)
    }

    /// List the results of a job owned by the caller
    pub async fn list_results(&self, user_id: &str, job_id: Uuid) -> Result<Vec<TaskResult>, JobError> {
        let job = self.owned_job(job_id, user_id).await?;
        Ok(self.stores.results.find_by_job(job.id).await?)
    }

    pub async fn get_result(&self, user_id: &str, result_id: Uuid) -> Result<TaskResult, JobError> {
        let result = self
            .stores
            .results
            .find_by_id(result_id)
            .await?
            .ok_or(JobError::ResultNotFound(result_id))?;
        if result.owner_id != user_id {
            return Err(JobError::PermissionDenied);
        }
        Ok(result)
    }

    /// Every known runner with its current availability
    pub async fn list_runners(&self) -> Result<Vec<RunnerInfo>, JobError> {
        Ok(self.balancer.list_runners_with_status().await?)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn load_job(&self, job_id: Uuid) -> Result<Job, JobError> {
        self.stores
            .jobs
            .find_by_id(job_id)
            .await?
            .ok_or(JobError::NotFound(job_id))
    }

    async fn owned_job(&self, job_id: Uuid, user_id: &str) -> Result<Job, JobError> {
        let job = self.load_job(job_id).await?;
        if !job.is_owned_by(user_id) {
            return Err(JobError::PermissionDenied);
        }
        Ok(job)
    }

    async fn model_of(&self, job: &Job) -> Result<Model, JobError> {
        self.stores
            .catalog
            .find_model(job.model_id)
            .await?
            .ok_or(JobError::ModelNotFound(job.model_id))
    }

    async fn dataset_of(&self, job: &Job) -> Result<Dataset, JobError> {
        self.stores
            .catalog
            .find_dataset(job.dataset_id)
            .await?
            .ok_or(JobError::DatasetNotFound(job.dataset_id))
    }
}

/// Column widths of the `jobs` and `results` tables
const MAX_JOB_NAME: usize = 100;
const MAX_JOB_DESCRIPTION: usize = 500;
const MAX_RESULT_NAME: usize = 255;

fn validate_name(name: &str, max: usize) -> Result<(), JobError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(JobError::Validation("name must not be empty".to_string()));
    }
    if name.chars().count() > max {
        return Err(JobError::Validation(format!(
            "name must be at most {} characters",
            max
        )));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), JobError> {
    if description.chars().count() > MAX_JOB_DESCRIPTION {
        return Err(JobError::Validation(format!(
            "description must be at most {} characters",
            MAX_JOB_DESCRIPTION
        )));
    }
    Ok(())
}

/// Runner of a job that can take a new task
fn bound_ready_runner(job: &Job) -> Result<String, JobError> {
    if job.status != JobStatus::Ready {
        return Err(JobError::InvalidState(format!(
            "job {} is {}, expected READY",
            job.id, job.status
        )));
    }
    job.runner_id
        .clone()
        .ok_or_else(|| JobError::InvalidState(format!("job {} has no runner", job.id)))
}

fn new_result(
    job: &Job,
    kind: TaskKind,
    name: &str,
    dataset_kind: DatasetKind,
    overrides: &HashMap<String, serde_json::Value>,
) -> TaskResult {
    let mut parameters = job.parameters.clone();
    parameters.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));

    let now = Utc::now();
    TaskResult {
        id: Uuid::new_v4(),
        job_id: job.id,
        name: name.trim().to_string(),
        kind,
        status: ResultStatus::Running,
        owner_id: job.owner_id.clone(),
        dataset_id: job.dataset_id,
        dataset_kind,
        parameters,
        metrics: Default::default(),
        files: Vec::new(),
        pretrained_model: None,
        predictions: None,
        created_at: now,
        modified_at: now,
    }
}

fn invalid_transition((from, to): (JobStatus, JobStatus)) -> JobError {
    JobError::InvalidState(format!("cannot move job from {} to {}", from, to))
}

fn path_string(path: impl AsRef<Path>) -> String {
    path.as_ref().to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_ready_runner() {
        let now = Utc::now();
        let mut job = Job {
            id: Uuid::new_v4(),
            name: "job".to_string(),
            description: String::new(),
            owner_id: "alice".to_string(),
            model_id: Uuid::new_v4(),
            model_name: "resnet".to_string(),
            dataset_id: Uuid::new_v4(),
            runner_id: None,
            parameters: HashMap::new(),
            status: JobStatus::Ready,
            created_at: now,
            modified_at: now,
        };
        assert!(matches!(bound_ready_runner(&job), Err(JobError::InvalidState(_))));

        job.runner_id = Some("r1".to_string());
        assert_eq!(bound_ready_runner(&job).unwrap(), "r1");

        job.status = JobStatus::Occupied;
        assert!(matches!(bound_ready_runner(&job), Err(JobError::InvalidState(_))));
    }

    #[test]
    fn test_name_limits() {
        assert!(validate_name("  baseline ", MAX_RESULT_NAME).is_ok());
        assert!(validate_name("   ", MAX_JOB_NAME).is_err());
        assert!(validate_name(&"é".repeat(MAX_JOB_NAME), MAX_JOB_NAME).is_ok());
        assert!(validate_name(&"é".repeat(MAX_JOB_NAME + 1), MAX_JOB_NAME).is_err());
        assert!(validate_description(&"d".repeat(MAX_JOB_DESCRIPTION)).is_ok());
        assert!(validate_description(&"d".repeat(MAX_JOB_DESCRIPTION + 1)).is_err());
    }

    #[test]
    fn test_new_result_overlays_parameters() {
        let now = Utc::now();
        let job = Job {
            id: Uuid::new_v4(),
            name: "job".to_string(),
            description: String::new(),
            owner_id: "alice".to_string(),
            model_id: Uuid::new_v4(),
            model_name: "resnet".to_string(),
            dataset_id: Uuid::new_v4(),
            runner_id: Some("r1".to_string()),
            parameters: HashMap::from([
                ("epochs".to_string(), serde_json::json!(10)),
                ("lr".to_string(), serde_json::json!(0.1)),
            ]),
            status: JobStatus::Ready,
            created_at: now,
            modified_at: now,
        };
        let overrides = HashMap::from([("epochs".to_string(), serde_json::json!(3))]);

        let result = new_result(&job, TaskKind::Train, " first run ", DatasetKind::Default, &overrides);
        assert_eq!(result.name, "first run");
        assert_eq!(result.status, ResultStatus::Running);
        assert_eq!(result.parameters["epochs"], serde_json::json!(3));
        assert_eq!(result.parameters["lr"], serde_json::json!(0.1));
        assert_eq!(result.owner_id, "alice");
    }
}
