//! Runner registry
//!
//! Loads the current runner set from a static list, a JSON file or a
//! discovery endpoint. Nothing is cached: every call reads the source again
//! and builds fresh [`Runner`] handles.

use mlab_core::dto::runner::DiscoveredRunner;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::BalancerError;
use super::runner::{Runner, RunnerConnector};

/// A runner as listed by a source, before a client is built for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerEntry {
    pub id: String,
    pub address: String,
}

impl RunnerEntry {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
        }
    }
}

/// Where runner entries come from
#[derive(Debug, Clone)]
pub enum RunnerSource {
    /// Fixed entries
    Static(Vec<RunnerEntry>),
    /// JSON file holding `[{ id, base_url, rpc_port }]`
    File(PathBuf),
    /// Endpoint answering `GET` with `{ id: { content: url } }`
    Discovery(String),
}

pub struct RunnerRegistry {
    source: RunnerSource,
    connector: Arc<dyn RunnerConnector>,
    http: reqwest::Client,
}

impl RunnerRegistry {
    pub fn new(source: RunnerSource, connector: Arc<dyn RunnerConnector>) -> Self {
        Self {
            source,
            connector,
            http: reqwest::Client::new(),
        }
    }

    /// Reads the runner entries from the source
    pub async fn entries(&self) -> Result<Vec<RunnerEntry>, BalancerError> {
        match &self.source {
            RunnerSource::Static(entries) => Ok(entries.clone()),
            RunnerSource::File(path) => {
                let raw = tokio::fs::read(path).await.map_err(|e| {
                    BalancerError::Registry(format!("cannot read {}: {}", path.display(), e))
                })?;
                let records: Vec<Value> = serde_json::from_slice(&raw).map_err(|e| {
                    BalancerError::Registry(format!("{} is not a runner list: {}", path.display(), e))
                })?;
                Ok(parse_runner_records(&records))
            }
            RunnerSource::Discovery(url) => {
                let response = self
                    .http
                    .get(url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| BalancerError::Registry(format!("discovery failed: {}", e)))?;
                let runners: BTreeMap<String, DiscoveredRunner> = response
                    .json()
                    .await
                    .map_err(|e| BalancerError::Registry(format!("bad discovery response: {}", e)))?;
                Ok(runners
                    .into_iter()
                    .map(|(id, runner)| RunnerEntry::new(id, runner.content))
                    .collect())
            }
        }
    }

    /// Builds a handle for every listed runner
    ///
    /// Entries whose client cannot be built are skipped with a warning.
    pub async fn list_runners(&self) -> Result<Vec<Runner>, BalancerError> {
        let entries = self.entries().await?;
        Ok(entries.iter().filter_map(|e| self.connect(e)).collect())
    }

    /// Builds a handle for the runner with the given id, without probing it
    pub async fn find(&self, runner_id: &str) -> Result<Option<Runner>, BalancerError> {
        let entries = self.entries().await?;
        Ok(entries
            .iter()
            .find(|e| e.id == runner_id)
            .and_then(|e| self.connect(e)))
    }

    fn connect(&self, entry: &RunnerEntry) -> Option<Runner> {
        match self.connector.connect(&entry.id, &entry.address) {
            Ok(client) => Some(Runner::new(&entry.id, &entry.address, client)),
            Err(e) => {
                tracing::warn!("Skipping runner {} at {}: {}", entry.id, entry.address, e);
                None
            }
        }
    }
}

/// Parses `{ id, base_url, rpc_port }` records, skipping malformed ones
///
/// Ids and ports may be strings or numbers.
pub fn parse_runner_records(records: &[Value]) -> Vec<RunnerEntry> {
    records
        .iter()
        .filter_map(|record| {
            let entry = parse_runner_record(record);
            if entry.is_none() {
                tracing::warn!("Skipping malformed runner record: {}", record);
            }
            entry
        })
        .collect()
}

fn parse_runner_record(record: &Value) -> Option<RunnerEntry> {
    let id = scalar_to_string(record.get("id")?)?;
    let base_url = record.get("base_url")?.as_str()?.trim_end_matches('/');
    let port = scalar_to_string(record.get("rpc_port")?)?;
    if id.is_empty() || base_url.is_empty() || port.is_empty() {
        return None;
    }
    Some(RunnerEntry::new(id, format!("{}:{}", base_url, port)))
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
