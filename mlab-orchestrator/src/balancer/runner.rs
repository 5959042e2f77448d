//! Runner handles
//!
//! A [`Runner`] binds a runner id and address to an RPC client. Handles are
//! built per registry listing and dropped after the operation that needed
//! them.

use mlab_runner_client::{HttpRunnerClient, RunnerError, RunnerRpc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Builds RPC clients for runner addresses
pub trait RunnerConnector: Send + Sync {
    /// Creates a client for one runner
    ///
    /// # Arguments
    /// * `id` - Runner id as listed by the registry
    /// * `address` - `host:port` or URL of the runner
    fn connect(&self, id: &str, address: &str) -> Result<Arc<dyn RunnerRpc>, RunnerError>;
}

/// Connects to runners over HTTP
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: reqwest::Client,
    unary_timeout: Duration,
}

impl HttpConnector {
    /// # Arguments
    /// * `unary_timeout` - Upper bound for status probes and other unary calls
    pub fn new(unary_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            unary_timeout,
        }
    }
}

impl RunnerConnector for HttpConnector {
    fn connect(&self, _id: &str, address: &str) -> Result<Arc<dyn RunnerRpc>, RunnerError> {
        let client = HttpRunnerClient::with_client(address, self.client.clone())?
            .with_unary_timeout(self.unary_timeout);
        Ok(Arc::new(client))
    }
}

/// A runner identity bound to its RPC client
#[derive(Clone)]
pub struct Runner {
    id: String,
    address: String,
    client: Arc<dyn RunnerRpc>,
}

impl Runner {
    pub fn new(id: impl Into<String>, address: impl Into<String>, client: Arc<dyn RunnerRpc>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            client,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// RPC operations of this runner
    pub fn rpc(&self) -> &dyn RunnerRpc {
        self.client.as_ref()
    }
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("id", &self.id)
            .field("address", &self.address)
            .finish()
    }
}
