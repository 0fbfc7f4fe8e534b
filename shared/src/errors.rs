/// Unified error types for the Social Downloader client.
use thiserror::Error;

/// Top-level error type for client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Media URL is empty")]
    EmptyReference,

    #[error("Superseded by a newer download request")]
    Superseded,
}

/// Errors from talking to the download backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Backend answered with HTTP {0}")]
    Status(u16),

    #[error("Backend rejected the request: {0}")]
    Rejected(String),

    #[error("Backend did not return a task id")]
    MissingTaskId,

    #[error("Unexpected response body: {0}")]
    InvalidResponse(String),
}

/// Errors raised while assembling client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid backend URL {url:?}: {reason}")]
    InvalidBackendUrl { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
