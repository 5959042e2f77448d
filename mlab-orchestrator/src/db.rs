use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Catalog tables, owned by the wider platform
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS models (
            id UUID PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            git_name VARCHAR(255) NOT NULL,
            owner_id VARCHAR(100) NOT NULL,
            private BOOLEAN NOT NULL DEFAULT FALSE,
            parameters JSONB NOT NULL DEFAULT '{}',
            default_model VARCHAR(255) NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS datasets (
            id UUID PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            git_name VARCHAR(255) NOT NULL,
            owner_id VARCHAR(100) NOT NULL,
            private BOOLEAN NOT NULL DEFAULT FALSE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create jobs table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id UUID PRIMARY KEY,
            name VARCHAR(100) NOT NULL,
            description VARCHAR(500) NOT NULL DEFAULT '',
            owner_id VARCHAR(100) NOT NULL,
            model_id UUID NOT NULL,
            model_name VARCHAR(255) NOT NULL,
            dataset_id UUID NOT NULL,
            runner_id VARCHAR(255),
            parameters JSONB NOT NULL DEFAULT '{}',
            status VARCHAR(20) NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            modified_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create results table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS results (
            id UUID PRIMARY KEY,
            job_id UUID NOT NULL REFERENCES jobs(id),
            name VARCHAR(255) NOT NULL,
            kind VARCHAR(10) NOT NULL,
            status VARCHAR(20) NOT NULL,
            owner_id VARCHAR(100) NOT NULL,
            dataset_id UUID NOT NULL,
            dataset_kind VARCHAR(20) NOT NULL,
            parameters JSONB NOT NULL DEFAULT '{}',
            metrics JSONB NOT NULL DEFAULT '{}',
            files TEXT[] NOT NULL DEFAULT '{}',
            pretrained_model TEXT,
            predictions JSONB,
            created_at TIMESTAMPTZ NOT NULL,
            modified_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // List-like queue storage; ids give FIFO order
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS queue_entries (
            id BIGSERIAL PRIMARY KEY,
            queue_name VARCHAR(255) NOT NULL,
            payload BYTEA NOT NULL,
            enqueued_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for better query performance
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_owner_status ON jobs(owner_id, status)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_results_job_status ON results(job_id, status)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_queue_entries_name ON queue_entries(queue_name, id)")
        .execute(pool)
        .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
