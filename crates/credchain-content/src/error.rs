//! Error types for the content store client.

use thiserror::Error;

/// Errors that can occur talking to the content store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContentError {
    /// The upload wallet cannot pay for the upload.
    #[error("insufficient content store funds: {0}")]
    InsufficientFunds(String),

    /// Network failure, timeout, or an unusable response.
    #[error("content store transport error: {0}")]
    Transport(String),

    /// The store refused the upload.
    #[error("upload rejected: {0}")]
    UploadRejected(String),
}

impl From<reqwest::Error> for ContentError {
    fn from(err: reqwest::Error) -> Self {
        ContentError::Transport(err.to_string())
    }
}

/// Result type for content store operations.
pub type Result<T> = std::result::Result<T, ContentError>;
