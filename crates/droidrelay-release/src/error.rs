//! Error types for droidrelay-release

use thiserror::Error;

/// Why an access token could not be obtained.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The private key is missing or cannot be decoded.
    #[error("credential error: {0}")]
    Credential(String),

    /// The signature could not be produced.
    #[error("signing error: {0}")]
    Signing(String),

    /// The auth endpoint was unreachable or rejected the request.
    #[error("auth exchange failed: {0}")]
    AuthExchange(String),
}

/// Errors from release backend calls and pipeline plumbing.
#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Non-2xx response from the release backend.
    #[error("release backend returned HTTP {status}: {body}")]
    Backend { status: u16, body: String },

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(String),

    /// No artifact matched under the outputs directory.
    #[error("no {extension} artifact found under {dir}")]
    ArtifactNotFound { extension: String, dir: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ReleaseError {
    fn from(err: reqwest::Error) -> Self {
        ReleaseError::Http(err.to_string())
    }
}

/// Result type for droidrelay-release operations.
pub type Result<T> = std::result::Result<T, ReleaseError>;
