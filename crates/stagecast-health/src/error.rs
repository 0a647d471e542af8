//! Error types for the health module.

use thiserror::Error;

/// Errors that can occur during health monitoring operations.
#[derive(Debug, Clone, Error)]
pub enum HealthError {
    /// Selected endpoint is not usable.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}
