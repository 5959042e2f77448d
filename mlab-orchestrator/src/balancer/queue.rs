//! Retry queue
//!
//! A named queue of [`ErrorContext`] payloads on top of a [`QueueStore`].

use std::sync::Arc;

use super::context::ErrorContext;
use crate::repository::{QueueStore, RepositoryError};

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("failed to encode error context: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] RepositoryError),
}

#[derive(Clone)]
pub struct RetryQueue {
    store: Arc<dyn QueueStore>,
    name: String,
}

impl RetryQueue {
    pub fn new(store: Arc<dyn QueueStore>, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends a context to the end of the queue
    pub async fn push(&self, context: &ErrorContext) -> Result<(), QueueError> {
        let payload = context.to_bytes()?;
        self.store.push(&self.name, &payload).await?;
        Ok(())
    }

    /// Every queued payload in FIFO order
    pub async fn peek_all(&self) -> Result<Vec<Vec<u8>>, QueueError> {
        Ok(self.store.peek_all(&self.name).await?)
    }

    /// Drops the first payload byte-equal to `payload`
    pub async fn remove_first(&self, payload: &[u8]) -> Result<bool, QueueError> {
        Ok(self.store.remove_first(&self.name, payload).await?)
    }
}
