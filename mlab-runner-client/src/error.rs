//! Error types for the runner client

use thiserror::Error;

/// Result type alias for runner RPC operations
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Errors that can occur when calling a runner
///
/// `Unavailable` means the runner could not be reached at all; every other
/// variant means the runner answered but the call did not succeed.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Transport failure reaching the runner
    #[error("Runner unavailable: {0}")]
    Unavailable(String),

    /// Runner answered with an error status
    #[error("Runner rejected request (status {status}): {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Error message from the runner
        message: String,
    },

    /// Failed to parse a response or a stream frame
    #[error("Failed to parse runner response: {0}")]
    ParseError(String),

    /// Runner address cannot be turned into a client
    #[error("Invalid runner address: {0}")]
    InvalidAddress(String),
}

impl RunnerError {
    /// Create a rejection from status code and message
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    /// Check if the runner could not be reached
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<reqwest::Error> for RunnerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::ParseError(err.to_string());
        }
        if let Some(status) = err.status() {
            return Self::rejected(status.as_u16(), err.to_string());
        }
        if err.is_builder() {
            return Self::InvalidAddress(err.to_string());
        }
        // connect, timeout, request and body errors: the runner is not reachable
        Self::Unavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_unavailable() {
        assert!(RunnerError::Unavailable("connection refused".into()).is_unavailable());
        assert!(!RunnerError::rejected(500, "boom").is_unavailable());
        assert!(!RunnerError::ParseError("bad frame".into()).is_unavailable());
    }

    #[test]
    fn test_display() {
        let err = RunnerError::rejected(409, "task already running");
        assert_eq!(
            err.to_string(),
            "Runner rejected request (status 409): task already running"
        );
    }
}
