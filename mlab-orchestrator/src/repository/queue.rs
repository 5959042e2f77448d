//! Queue Store
//!
//! Named FIFO lists of opaque byte payloads. Producers append; an external
//! consumer reads the whole list and removes entries it has replayed.

use async_trait::async_trait;
use sqlx::PgPool;

use super::Result;

/// List-like storage behind named queues
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Appends a payload to the end of the queue
    ///
    /// # Arguments
    /// * `queue` - Queue name
    /// * `payload` - Serialized entry
    async fn push(&self, queue: &str, payload: &[u8]) -> Result<()>;

    /// Returns every payload in insertion order without removing any
    async fn peek_all(&self, queue: &str) -> Result<Vec<Vec<u8>>>;

    /// Removes the first entry equal to `payload`
    ///
    /// # Returns
    /// `true` if an entry was removed
    async fn remove_first(&self, queue: &str, payload: &[u8]) -> Result<bool>;
}

/// Postgres implementation of [`QueueStore`] backed by `queue_entries`
#[derive(Debug, Clone)]
pub struct PgQueueStore {
    pool: PgPool,
}

impl PgQueueStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueueStore for PgQueueStore {
    async fn push(&self, queue: &str, payload: &[u8]) -> Result<()> {
        sqlx::query("INSERT INTO queue_entries (queue_name, payload) VALUES ($1, $2)")
            .bind(queue)
            .bind(payload)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn peek_all(&self, queue: &str) -> Result<Vec<Vec<u8>>> {
        let payloads: Vec<Vec<u8>> = sqlx::query_scalar(
            r#"
            SELECT payload
            FROM queue_entries
            WHERE queue_name = $1
            ORDER BY id ASC
            "#,
        )
        .bind(queue)
        .fetch_all(&self.pool)
        .await?;

        Ok(payloads)
    }

    async fn remove_first(&self, queue: &str, payload: &[u8]) -> Result<bool> {
        let removed = sqlx::query(
            r#"
            DELETE FROM queue_entries
            WHERE id = (
                SELECT id FROM queue_entries
                WHERE queue_name = $1 AND payload = $2
                ORDER BY id ASC
                LIMIT 1
            )
            "#,
        )
        .bind(queue)
        .bind(payload)
        .execute(&self.pool)
        .await?;

        Ok(removed.rows_affected() > 0)
    }
}
