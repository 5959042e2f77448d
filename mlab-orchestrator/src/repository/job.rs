//! Job Repository
//!
//! Handles all database operations related to jobs.

use async_trait::async_trait;
use mlab_core::domain::job::{Job, JobStatus};
use sqlx::PgPool;
use uuid::Uuid;

use super::{JobRepository, RepositoryError, Result};

/// Postgres implementation of [`JobRepository`]
#[derive(Debug, Clone)]
pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn create(&self, job: &Job) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (id, name, description, owner_id, model_id, model_name, dataset_id,
                              runner_id, parameters, status, created_at, modified_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(job.id)
        .bind(&job.name)
        .bind(&job.description)
        .bind(&job.owner_id)
        .bind(job.model_id)
        .bind(&job.model_name)
        .bind(job.dataset_id)
        .bind(&job.runner_id)
        .bind(sqlx::types::Json(&job.parameters))
        .bind(job.status.as_str())
        .bind(job.created_at)
        .bind(job.modified_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, name, description, owner_id, model_id, model_name, dataset_id,
                   runner_id, parameters, status, created_at, modified_at
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }

    async fn update(&self, job: &Job) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET runner_id = $1, parameters = $2, status = $3, modified_at = $4
            WHERE id = $5
            "#,
        )
        .bind(&job.runner_id)
        .bind(sqlx::types::Json(&job.parameters))
        .bind(job.status.as_str())
        .bind(job.modified_at)
        .bind(job.id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_open_by_owner(&self, owner_id: &str) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, name, description, owner_id, model_id, model_name, dataset_id,
                   runner_id, parameters, status, created_at, modified_at
            FROM jobs
            WHERE owner_id = $1 AND status != $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner_id)
        .bind(JobStatus::Closed.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Job::try_from).collect()
    }

    async fn count_open_by_owner(&self, owner_id: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE owner_id = $1 AND status != $2")
                .bind(owner_id)
                .bind(JobStatus::Closed.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    name: String,
    description: String,
    owner_id: String,
    model_id: Uuid,
    model_name: String,
    dataset_id: Uuid,
    runner_id: Option<String>,
    parameters: serde_json::Value,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
    modified_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = RepositoryError;

    fn try_from(row: JobRow) -> Result<Self> {
        let status = row.status.parse::<JobStatus>().map_err(RepositoryError::Corrupt)?;
        let parameters = serde_json::from_value(row.parameters).map_err(|e| {
            RepositoryError::Corrupt(format!("parameters of job {}: {}", row.id, e))
        })?;

        Ok(Job {
            id: row.id,
            name: row.name,
            description: row.description,
            owner_id: row.owner_id,
            model_id: row.model_id,
            model_name: row.model_name,
            dataset_id: row.dataset_id,
            runner_id: row.runner_id,
            parameters,
            status,
            created_at: row.created_at,
            modified_at: row.modified_at,
        })
    }
}
