//! Error types for Google Tasks API calls

use thiserror::Error;

use crate::auth::AuthError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response; `message` is the API's own explanation when given
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("{0}")]
    InvalidInput(String),
}

/// Result type alias for Tasks API operations
pub type ApiResult<T> = Result<T, ApiError>;
