//! Result Repository
//!
//! Handles all database operations related to task results.

use async_trait::async_trait;
use mlab_core::domain::catalog::DatasetKind;
use mlab_core::domain::result::{ResultStatus, TaskKind, TaskResult};
use sqlx::PgPool;
use uuid::Uuid;

use super::{RepositoryError, Result, ResultRepository};

const SELECT_RESULTS: &str = r#"
    SELECT id, job_id, name, kind, status, owner_id, dataset_id, dataset_kind, parameters,
           metrics, files, pretrained_model, predictions, created_at, modified_at
    FROM results
"#;

/// Postgres implementation of [`ResultRepository`]
#[derive(Debug, Clone)]
pub struct PgResultRepository {
    pool: PgPool,
}

impl PgResultRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResultRepository for PgResultRepository {
    async fn create(&self, result: &TaskResult) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO results (id, job_id, name, kind, status, owner_id, dataset_id, dataset_kind,
                                 parameters, metrics, files, pretrained_model, predictions,
                                 created_at, modified_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(result.id)
        .bind(result.job_id)
        .bind(&result.name)
        .bind(result.kind.as_str())
        .bind(result.status.as_str())
        .bind(&result.owner_id)
        .bind(result.dataset_id)
        .bind(result.dataset_kind.as_str())
        .bind(sqlx::types::Json(&result.parameters))
        .bind(sqlx::types::Json(&result.metrics))
        .bind(&result.files)
        .bind(&result.pretrained_model)
        .bind(&result.predictions)
        .bind(result.created_at)
        .bind(result.modified_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TaskResult>> {
        let row = sqlx::query_as::<_, ResultRow>(&format!("{} WHERE id = $1", SELECT_RESULTS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TaskResult::try_from).transpose()
    }

    async fn find_by_job(&self, job_id: Uuid) -> Result<Vec<TaskResult>> {
        let rows = sqlx::query_as::<_, ResultRow>(&format!(
            "{} WHERE job_id = $1 ORDER BY created_at ASC",
            SELECT_RESULTS
        ))
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TaskResult::try_from).collect()
    }

    async fn find_by_job_and_status(
        &self,
        job_id: Uuid,
        status: ResultStatus,
    ) -> Result<Vec<TaskResult>> {
        let rows = sqlx::query_as::<_, ResultRow>(&format!(
            "{} WHERE job_id = $1 AND status = $2 ORDER BY created_at ASC",
            SELECT_RESULTS
        ))
        .bind(job_id)
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TaskResult::try_from).collect()
    }

    async fn finish(&self, result: &TaskResult) -> Result<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE results
            SET status = $1, metrics = $2, files = $3, pretrained_model = $4,
                predictions = $5, modified_at = $6
            WHERE id = $7 AND status = $8
            "#,
        )
        .bind(result.status.as_str())
        .bind(sqlx::types::Json(&result.metrics))
        .bind(&result.files)
        .bind(&result.pretrained_model)
        .bind(&result.predictions)
        .bind(result.modified_at)
        .bind(result.id)
        .bind(ResultStatus::Running.as_str())
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() > 0)
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ResultRow {
    id: Uuid,
    job_id: Uuid,
    name: String,
    kind: String,
    status: String,
    owner_id: String,
    dataset_id: Uuid,
    dataset_kind: String,
    parameters: serde_json::Value,
    metrics: serde_json::Value,
    files: Vec<String>,
    pretrained_model: Option<String>,
    predictions: Option<serde_json::Value>,
    created_at: chrono::DateTime<chrono::Utc>,
    modified_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<ResultRow> for TaskResult {
    type Error = RepositoryError;

    fn try_from(row: ResultRow) -> Result<Self> {
        let kind = row.kind.parse::<TaskKind>().map_err(RepositoryError::Corrupt)?;
        let status = row.status.parse::<ResultStatus>().map_err(RepositoryError::Corrupt)?;
        let dataset_kind = row
            .dataset_kind
            .parse::<DatasetKind>()
            .map_err(RepositoryError::Corrupt)?;
        let parameters = serde_json::from_value(row.parameters).map_err(|e| {
            RepositoryError::Corrupt(format!("parameters of result {}: {}", row.id, e))
        })?;
        let metrics = serde_json::from_value(row.metrics)
            .map_err(|e| RepositoryError::Corrupt(format!("metrics of result {}: {}", row.id, e)))?;

        Ok(TaskResult {
            id: row.id,
            job_id: row.job_id,
            name: row.name,
            kind,
            status,
            owner_id: row.owner_id,
            dataset_id: row.dataset_id,
            dataset_kind,
            parameters,
            metrics,
            files: row.files,
            pretrained_model: row.pretrained_model,
            predictions: row.predictions,
            created_at: row.created_at,
            modified_at: row.modified_at,
        })
    }
}
