//! In-memory repositories
//!
//! [`MemoryStore`] implements every entity repository and [`MemoryQueue`]
//! implements [`QueueStore`]. Both are cheap to clone and share state across
//! clones, so one instance can back the service while a test inspects it.

use async_trait::async_trait;
use mlab_core::domain::catalog::{Dataset, Model};
use mlab_core::domain::job::{Job, JobStatus};
use mlab_core::domain::result::{ResultStatus, TaskResult};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CatalogRepository, JobRepository, QueueStore, Result, ResultRepository};

#[derive(Default)]
struct Tables {
    models: HashMap<Uuid, Model>,
    datasets: HashMap<Uuid, Dataset>,
    jobs: HashMap<Uuid, Job>,
    /// Kept in insertion order
    results: Vec<TaskResult>,
}

/// In-memory implementation of the job, result and catalog repositories
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a catalog model
    pub async fn insert_model(&self, model: Model) {
        self.tables.write().await.models.insert(model.id, model);
    }

    /// Registers a catalog dataset
    pub async fn insert_dataset(&self, dataset: Dataset) {
        self.tables.write().await.datasets.insert(dataset.id, dataset);
    }
}

#[async_trait]
impl JobRepository for MemoryStore {
    async fn create(&self, job: &Job) -> Result<()> {
        self.tables.write().await.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Job>> {
        Ok(self.tables.read().await.jobs.get(&id).cloned())
    }

    async fn update(&self, job: &Job) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(stored) = tables.jobs.get_mut(&job.id) {
            *stored = job.clone();
        }
        Ok(())
    }

    async fn list_open_by_owner(&self, owner_id: &str) -> Result<Vec<Job>> {
        let tables = self.tables.read().await;
        let mut jobs: Vec<Job> = tables
            .jobs
            .values()
            .filter(|j| j.owner_id == owner_id && j.status != JobStatus::Closed)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn count_open_by_owner(&self, owner_id: &str) -> Result<i64> {
        let tables = self.tables.read().await;
        let count = tables
            .jobs
            .values()
            .filter(|j| j.owner_id == owner_id && j.status != JobStatus::Closed)
            .count();
        Ok(count as i64)
    }
}

#[async_trait]
impl ResultRepository for MemoryStore {
    async fn create(&self, result: &TaskResult) -> Result<()> {
        self.tables.write().await.results.push(result.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TaskResult>> {
        let tables = self.tables.read().await;
        Ok(tables.results.iter().find(|r| r.id == id).cloned())
    }

    async fn find_by_job(&self, job_id: Uuid) -> Result<Vec<TaskResult>> {
        let tables = self.tables.read().await;
        Ok(tables
            .results
            .iter()
            .filter(|r| r.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn find_by_job_and_status(
        &self,
        job_id: Uuid,
        status: ResultStatus,
    ) -> Result<Vec<TaskResult>> {
        let tables = self.tables.read().await;
        Ok(tables
            .results
            .iter()
            .filter(|r| r.job_id == job_id && r.status == status)
            .cloned()
            .collect())
    }

    async fn finish(&self, result: &TaskResult) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables
            .results
            .iter_mut()
            .find(|r| r.id == result.id && r.is_running())
        {
            Some(stored) => {
                *stored = result.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn find_model(&self, id: Uuid) -> Result<Option<Model>> {
        Ok(self.tables.read().await.models.get(&id).cloned())
    }

    async fn find_dataset(&self, id: Uuid) -> Result<Option<Dataset>> {
        Ok(self.tables.read().await.datasets.get(&id).cloned())
    }
}

/// In-memory implementation of [`QueueStore`]
#[derive(Clone, Default)]
pub struct MemoryQueue {
    queues: Arc<RwLock<HashMap<String, VecDeque<Vec<u8>>>>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in a queue
    pub async fn len(&self, queue: &str) -> usize {
        self.queues.read().await.get(queue).map_or(0, |q| q.len())
    }
}

#[async_trait]
impl QueueStore for MemoryQueue {
    async fn push(&self, queue: &str, payload: &[u8]) -> Result<()> {
        self.queues
            .write()
            .await
            .entry(queue.to_string())
            .or_default()
            .push_back(payload.to_vec());
        Ok(())
    }

    async fn peek_all(&self, queue: &str) -> Result<Vec<Vec<u8>>> {
        let queues = self.queues.read().await;
        Ok(queues
            .get(queue)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn remove_first(&self, queue: &str, payload: &[u8]) -> Result<bool> {
        let mut queues = self.queues.write().await;
        let Some(entries) = queues.get_mut(queue) else {
            return Ok(false);
        };
        match entries.iter().position(|p| p.as_slice() == payload) {
            Some(index) => {
                entries.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
