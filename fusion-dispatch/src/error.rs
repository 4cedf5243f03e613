//! Dispatch error types.

use fusion_mail::MailError;
use fusion_redis::RedisError;
use thiserror::Error;

/// Result type for dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Dispatch errors.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Jobs are keyed by recipient, so one is required.
    #[error("Recipient must not be empty")]
    EmptyRecipient,

    /// The job store or notification channel failed.
    #[error("Substrate error: {0}")]
    Substrate(String),

    /// A job could not be serialized for publishing.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A template could not be rendered.
    #[error("Template error: {0}")]
    Template(String),

    /// A stored or published record is not a valid job.
    #[error("Invalid job record: {0}")]
    InvalidRecord(String),
}

impl From<RedisError> for DispatchError {
    fn from(err: RedisError) -> Self {
        Self::Substrate(err.to_string())
    }
}

impl From<MailError> for DispatchError {
    fn from(err: MailError) -> Self {
        Self::Template(err.to_string())
    }
}
