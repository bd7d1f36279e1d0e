use alertscout_api::{FetchError, GitHubError};
use thiserror::Error;

/// All the ways a scan can go wrong
///
/// Recoverable repository conditions (alerts disabled, rate limits) are not
/// in here: those come back as warnings alongside an empty alert set.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    ApiError(#[from] GitHubError),

    #[error(transparent)]
    FetchError(#[from] FetchError),

    #[error("Invalid scan target: {0}")]
    InvalidTarget(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
