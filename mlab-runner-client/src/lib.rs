//! MLab Runner Client
//!
//! Typed RPC client for MLab runners.
//!
//! [`RunnerRpc`] is the runner contract the orchestrator programs against:
//! a status probe, a connectivity probe and the task lifecycle calls, with
//! `run_task` answering as a server stream. [`HttpRunnerClient`] implements
//! it over HTTP with newline-delimited JSON for the stream. Any other
//! transport only needs another implementation of the trait.
//!
//! # Example
//!
//! ```no_run
//! use mlab_runner_client::{HttpRunnerClient, RunnerRpc};
//!
//! # async fn example() -> mlab_runner_client::Result<()> {
//! let runner = HttpRunnerClient::new("10.0.0.12:50051")?;
//! let availability = runner.get_status().await?;
//! println!("runner is {}", availability);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod stream;
mod tasks;

// Re-export commonly used types
pub use error::{Result, RunnerError};
pub use stream::{FrameStream, TaskStream};

use async_trait::async_trait;
use mlab_core::domain::runner::{Connectivity, RunnerAvailability};
use mlab_core::dto::task::{CreateTaskEnvironment, RemoveTaskEnvironment, RunTask, StopTask};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Operations a runner exposes
///
/// All calls are async; transport failures surface as
/// [`RunnerError::Unavailable`] so callers can tell a runner that is down
/// apart from one that refused the request.
#[async_trait]
pub trait RunnerRpc: Send + Sync {
    /// Asks the runner whether it accepts new work
    async fn get_status(&self) -> Result<RunnerAvailability>;

    /// Reports whether the runner is reachable at all (diagnostics only)
    async fn connectivity(&self) -> Connectivity;

    /// Prepares the job's environment (model and dataset checkouts)
    async fn create_task_environment(&self, req: CreateTaskEnvironment) -> Result<()>;

    /// Starts a task and streams its output and outcome
    async fn run_task(&self, req: RunTask) -> Result<TaskStream>;

    /// Asks the runner to terminate the job's running task
    async fn stop_task(&self, req: StopTask) -> Result<()>;

    /// Tears down the job's environment
    async fn remove_task_environment(&self, req: RemoveTaskEnvironment) -> Result<()>;
}

/// HTTP client for a single runner
#[derive(Debug, Clone)]
pub struct HttpRunnerClient {
    /// Base URL of the runner (e.g., "http://10.0.0.12:50051")
    base_url: String,
    /// HTTP client instance
    client: Client,
    /// Upper bound for unary calls; the task stream is bounded by the caller
    unary_timeout: Duration,
}

impl HttpRunnerClient {
    /// Default upper bound for unary calls
    pub const DEFAULT_UNARY_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a client for a runner address
    ///
    /// # Arguments
    /// * `address` - `host:port`, or a full `http(s)://` URL
    pub fn new(address: &str) -> Result<Self> {
        Self::with_client(address, Client::new())
    }

    /// Create a client with a custom HTTP client
    ///
    /// This allows you to configure proxies, TLS settings, connect timeouts, etc.
    pub fn with_client(address: &str, client: Client) -> Result<Self> {
        Ok(Self {
            base_url: normalize_address(address)?,
            client,
            unary_timeout: Self::DEFAULT_UNARY_TIMEOUT,
        })
    }

    /// Override the unary call timeout
    pub fn with_unary_timeout(mut self, timeout: Duration) -> Self {
        self.unary_timeout = timeout;
        self
    }

    /// Get the base URL of the runner
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code and deserialize the JSON body
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let response = self.check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| RunnerError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Check the status code of a call that returns no content
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        self.check_status(response).await.map(|_| ())
    }

    async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RunnerError::rejected(status.as_u16(), error_text));
        }

        Ok(response)
    }
}

/// Turns `host:port` into a base URL; URLs with a scheme are kept as-is.
fn normalize_address(address: &str) -> Result<String> {
    let address = address.trim().trim_end_matches('/');
    if address.is_empty() {
        return Err(RunnerError::InvalidAddress("empty address".to_string()));
    }

    let url = if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    };

    reqwest::Url::parse(&url)
        .map_err(|e| RunnerError::InvalidAddress(format!("{}: {}", address, e)))?;

    Ok(url)
}
