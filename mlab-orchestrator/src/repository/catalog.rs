//! Catalog Repository
//!
//! Read-only access to models and datasets.

use async_trait::async_trait;
use mlab_core::domain::catalog::{Dataset, Model};
use sqlx::PgPool;
use uuid::Uuid;

use super::{CatalogRepository, RepositoryError, Result};

/// Postgres implementation of [`CatalogRepository`]
#[derive(Debug, Clone)]
pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn find_model(&self, id: Uuid) -> Result<Option<Model>> {
        let row = sqlx::query_as::<_, ModelRow>(
            r#"
            SELECT id, name, git_name, owner_id, private, parameters, default_model
            FROM models
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Model::try_from).transpose()
    }

    async fn find_dataset(&self, id: Uuid) -> Result<Option<Dataset>> {
        let row = sqlx::query_as::<_, DatasetRow>(
            r#"
            SELECT id, name, git_name, owner_id, private
            FROM datasets
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ModelRow {
    id: Uuid,
    name: String,
    git_name: String,
    owner_id: String,
    private: bool,
    parameters: serde_json::Value,
    default_model: String,
}

impl TryFrom<ModelRow> for Model {
    type Error = RepositoryError;

    fn try_from(row: ModelRow) -> Result<Self> {
        let parameters = serde_json::from_value(row.parameters).map_err(|e| {
            RepositoryError::Corrupt(format!("parameters of model {}: {}", row.id, e))
        })?;

        Ok(Model {
            id: row.id,
            name: row.name,
            git_name: row.git_name,
            owner_id: row.owner_id,
            private: row.private,
            parameters,
            default_model: row.default_model,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DatasetRow {
    id: Uuid,
    name: String,
    git_name: String,
    owner_id: String,
    private: bool,
}

impl From<DatasetRow> for Dataset {
    fn from(row: DatasetRow) -> Self {
        Dataset {
            id: row.id,
            name: row.name,
            git_name: row.git_name,
            owner_id: row.owner_id,
            private: row.private,
        }
    }
}
