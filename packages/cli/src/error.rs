//! Error types
//!
//! Typed errors for the definition store and the agent sync client. The
//! command layer wraps these in `anyhow` with extra context.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or saving a service definition file
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read service definition {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse service definition {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode service definition: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to write service definition {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while syncing a definition with the agent
#[derive(Debug, Error)]
pub enum SyncError {
    /// The definition has no name; nothing was sent
    #[error("service name is empty")]
    EmptyName,

    #[error("invalid consul agent url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to encode service definition: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to reach consul agent: {0}")]
    Transport(#[from] reqwest::Error),

    /// The agent answered with something other than 200
    #[error("{operation} did not get successful http response: {status}")]
    Status {
        operation: &'static str,
        status: String,
    },
}

impl SyncError {
    /// True for errors raised before any request was sent
    pub fn is_validation(&self) -> bool {
        matches!(self, SyncError::EmptyName)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_carries_status_text() {
        let err = SyncError::Status {
            operation: "register",
            status: "500 Internal Server Error".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("500 Internal Server Error"));
        assert!(msg.starts_with("register"));
        assert!(!err.is_validation());
    }

    #[test]
    fn test_empty_name_is_validation() {
        assert!(SyncError::EmptyName.is_validation());
        assert_eq!(SyncError::EmptyName.to_string(), "service name is empty");
    }
}
