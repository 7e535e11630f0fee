use thiserror::Error;

/// Errors raised by cloud provider implementations.
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider API error: {0}")]
    Api(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal provider error: {0}")]
    Internal(String),
}
