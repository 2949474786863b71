use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// The upstream rejected the access token (HTTP 401).
    ///
    /// Kept as its own variant because the poller branches on it:
    /// a 401 triggers a token refresh instead of the transient-error path.
    #[error("Upstream rejected the access token")]
    Unauthorized,

    #[error("Upstream error: {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
