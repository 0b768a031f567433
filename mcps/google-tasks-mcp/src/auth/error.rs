//! Error types for credential storage and authorization

use std::path::PathBuf;
use thiserror::Error;

/// Errors from reading or writing credential files
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The credentials file has neither an `installed` nor a `web` block
    #[error("{0} contains neither an \"installed\" nor a \"web\" client")]
    MissingApplicationCredentials(PathBuf),
}

/// Errors from a single `authorize()` attempt
#[derive(Error, Debug)]
pub enum AuthError {
    /// The user declined the requested scope
    #[error("authorization was denied by the user")]
    ConsentDenied,

    /// Network or protocol failure talking to the consent provider
    #[error("authorization provider error: {0}")]
    ProviderError(String),

    /// The stored refresh token was revoked or expired; consent is needed again
    #[error("stored authorization is no longer valid: {0}")]
    GrantRevoked(String),

    /// Local setup prevents running the consent flow
    #[error("authorization is not configured: {0}")]
    Configuration(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    pub fn provider(message: impl Into<String>) -> Self {
        AuthError::ProviderError(message.into())
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        AuthError::ProviderError(e.to_string())
    }
}

/// Result type alias for authorization operations
pub type AuthResult<T> = Result<T, AuthError>;
