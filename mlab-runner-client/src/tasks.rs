//! Runner RPC calls over HTTP

use async_trait::async_trait;
use mlab_core::domain::runner::{Connectivity, RunnerAvailability};
use mlab_core::dto::runner::RunnerStatusResponse;
use mlab_core::dto::task::{CreateTaskEnvironment, RemoveTaskEnvironment, RunTask, StopTask};
use std::time::Duration;
use tracing::debug;

use crate::error::Result;
use crate::stream::{FrameStream, TaskStream};
use crate::{HttpRunnerClient, RunnerRpc};

const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(2);

#[async_trait]
impl RunnerRpc for HttpRunnerClient {
    // =============================================================================
    // Health
    // =============================================================================

    async fn get_status(&self) -> Result<RunnerAvailability> {
        let response = self
            .client
            .get(self.url("/status"))
            .timeout(self.unary_timeout)
            .send()
            .await?;

        let status: RunnerStatusResponse = self.handle_response(response).await?;
        debug!("Runner {} reported status {:?}", self.base_url, status.status);

        Ok(RunnerAvailability::from_status(&status.status))
    }

    async fn connectivity(&self) -> Connectivity {
        let probe = self
            .client
            .get(self.url("/health"))
            .timeout(CONNECTIVITY_TIMEOUT)
            .send()
            .await;

        match probe {
            Ok(_) => Connectivity::Ready,
            Err(_) => Connectivity::Unreachable,
        }
    }

    // =============================================================================
    // Task Lifecycle
    // =============================================================================

    async fn create_task_environment(&self, req: CreateTaskEnvironment) -> Result<()> {
        // Environment setup clones repositories; the caller bounds it
        let response = self
            .client
            .post(self.url("/tasks/environment"))
            .json(&req)
            .send()
            .await?;

        self.handle_empty_response(response).await
    }

    async fn run_task(&self, req: RunTask) -> Result<TaskStream> {
        let response = self
            .client
            .post(self.url("/tasks/run"))
            .json(&req)
            .send()
            .await?;

        let response = self.check_status(response).await?;

        Ok(Box::pin(FrameStream::from_response(response)))
    }

    async fn stop_task(&self, req: StopTask) -> Result<()> {
        let response = self
            .client
            .post(self.url("/tasks/stop"))
            .timeout(self.unary_timeout)
            .json(&req)
            .send()
            .await?;

        self.handle_empty_response(response).await
    }

    async fn remove_task_environment(&self, req: RemoveTaskEnvironment) -> Result<()> {
        let response = self
            .client
            .delete(self.url("/tasks/environment"))
            .timeout(self.unary_timeout)
            .json(&req)
            .send()
            .await?;

        self.handle_empty_response(response).await
    }
}
