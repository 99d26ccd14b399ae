//! Mail service and authentication error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by [`MailService`](super::MailService) operations.
#[derive(Error, Debug)]
pub enum MailError {
    /// Could not reach the service.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Request did not complete in time.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Token rejected or missing scopes.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Message or label does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Service asked us to slow down.
    #[error("Rate limited, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Any other non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Response body did not have the expected shape.
    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl MailError {
    /// Whether repeating the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            MailError::Connection(_) | MailError::Timeout(_) | MailError::RateLimited { .. } => {
                true
            }
            MailError::Api { status, .. } => *status >= 500,
            MailError::Authentication(_) | MailError::NotFound(_) | MailError::Parse(_) => false,
        }
    }
}

impl From<reqwest::Error> for MailError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MailError::Timeout(err.to_string())
        } else if err.is_decode() {
            MailError::Parse(err.to_string())
        } else {
            MailError::Connection(err.to_string())
        }
    }
}

/// Errors raised while obtaining a Gmail access token.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Failed to read token file '{path}': {source}")]
    ReadTokenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write token file '{path}': {source}")]
    WriteTokenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Token file is not valid JSON: {0}")]
    ParseTokenFile(#[from] serde_json::Error),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Secret resolution failed: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Token refresh failed: {0}")]
    Refresh(String),

    #[error("Failed to read OAuth client file '{path}': {source}")]
    ReadCredentialsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("OAuth client file '{path}' is invalid: {reason}")]
    InvalidCredentialsFile { path: PathBuf, reason: String },

    #[error("Authorization failed: {0}")]
    Authorization(String),
}
