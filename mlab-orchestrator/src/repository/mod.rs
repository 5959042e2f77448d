//! Repository Module
//!
//! Data access layer for the orchestrator.
//! Each repository trait covers one persisted entity; the Postgres
//! implementations live next to their trait and [`memory`] backs them all in
//! memory for tests and local runs.

pub mod catalog;
pub mod job;
pub mod memory;
pub mod queue;
pub mod result;

use async_trait::async_trait;
use mlab_core::domain::catalog::{Dataset, Model};
use mlab_core::domain::job::Job;
use mlab_core::domain::result::{ResultStatus, TaskResult};
use uuid::Uuid;

// Re-export for convenience
pub use catalog::PgCatalogRepository;
pub use job::PgJobRepository;
pub use memory::{MemoryQueue, MemoryStore};
pub use queue::{PgQueueStore, QueueStore};
pub use result::PgResultRepository;

/// Repository error type
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, job: &Job) -> Result<()>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Job>>;

    /// Persists every mutable field of the job
    async fn update(&self, job: &Job) -> Result<()>;

    /// Jobs of an owner that are not closed
    async fn list_open_by_owner(&self, owner_id: &str) -> Result<Vec<Job>>;

    async fn count_open_by_owner(&self, owner_id: &str) -> Result<i64>;
}

#[async_trait]
pub trait ResultRepository: Send + Sync {
    async fn create(&self, result: &TaskResult) -> Result<()>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TaskResult>>;

    async fn find_by_job(&self, job_id: Uuid) -> Result<Vec<TaskResult>>;

    async fn find_by_job_and_status(
        &self,
        job_id: Uuid,
        status: ResultStatus,
    ) -> Result<Vec<TaskResult>>;

    /// Stores a finished result only if the stored one is still running
    ///
    /// Returns `false` when the result was already finished, which makes
    /// finishing idempotent and lets the first of a commit and a stop win.
    async fn finish(&self, result: &TaskResult) -> Result<bool>;
}

/// Read access to the model/dataset catalog
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn find_model(&self, id: Uuid) -> Result<Option<Model>>;

    async fn find_dataset(&self, id: Uuid) -> Result<Option<Dataset>>;
}
