//! Runner DTOs
//!
//! Runner discovery inputs and the status call response.

use serde::{Deserialize, Serialize};

/// Response of a runner's status call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerStatusResponse {
    pub status: String,
}

/// Entry of the discovery endpoint's `{ id: { content: url } }` map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredRunner {
    pub content: String,
}
