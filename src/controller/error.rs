//! Error types for the controller.
//!
//! Errors are classified by how a reconciliation pass recovers from them:
//! skip the affected role group, end the pass, or retry later.

use std::time::Duration;
use thiserror::Error;

use crate::topology::properties::RenderError;

/// Error type for controller operations
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Invalid or missing configuration for a role group
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// External dependency not resolvable yet
    #[error("Dependency error: {0}")]
    Dependency(String),

    /// Optimistic concurrency rejection from the API server
    #[error("Conflict writing {kind} {name}")]
    Conflict { kind: String, name: String },

    /// Internal invariant violated (wiring defect)
    #[error("Internal invariant violated: {0}")]
    Internal(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A generated configuration file could not be written
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

impl Error {
    /// Check if this error indicates a not-found condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Kube(kube::Error::Api(e)) if e.code == 404)
    }

    /// Check if this error is an optimistic concurrency conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
            || matches!(self, Error::Kube(kube::Error::Api(e)) if e.code == 409)
    }

    /// Check if this error should be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube(e) => {
                // Retry on network errors, rate limiting, and server errors
                matches!(
                    e,
                    kube::Error::Api(api_err) if api_err.code >= 500 || api_err.code == 429
                ) || matches!(e, kube::Error::Service(_))
            }
            Error::Conflict { .. } | Error::Dependency(_) => true,
            Error::Configuration(_)
            | Error::Internal(_)
            | Error::Serialization(_)
            | Error::Render(_) => false,
        }
    }

    /// Errors that only affect one role group; its siblings proceed.
    pub fn skips_role_group(&self) -> bool {
        matches!(
            self,
            Error::Configuration(_) | Error::Dependency(_) | Error::Internal(_) | Error::Render(_)
        )
    }

    /// Get the recommended requeue duration for this error
    pub fn requeue_after(&self, interval: Duration) -> Duration {
        if self.is_retryable() || self.is_conflict() {
            interval
        } else {
            // Wait for the user to change the resource
            Duration::from_secs(300)
        }
    }
}

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, Error>;
