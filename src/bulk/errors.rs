//! Bulk interface error types.

use thiserror::Error;

/// Caller-visible bulk interface failure, mapped onto HTTP status codes by
/// the route layer.
#[derive(Debug, Error)]
pub enum BulkError {
    /// No remote credentials are configured; the interface is off.
    #[error("bulk data interface is disabled")]
    Disabled,

    /// A required request parameter is absent.
    #[error("requires parameter [{0}]")]
    MissingParam(&'static str),

    /// A request parameter has an unusable value.
    #[error("invalid parameter [{0}]")]
    InvalidParam(&'static str),

    /// The request body is not the expected JSON shape.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Credential check failed.
    #[error("auth failed for user [{0}]")]
    AuthFailed(String),

    /// No repository registered under the given name.
    #[error("repository [{0}] not found")]
    RepositoryNotFound(String),

    /// Underlying engine failure.
    #[error("{0}")]
    Backend(String),
}

impl BulkError {
    /// HTTP status code for the response envelope.
    pub fn status_code(&self) -> u16 {
        match self {
            BulkError::Disabled => 501,
            BulkError::MissingParam(_)
            | BulkError::InvalidParam(_)
            | BulkError::InvalidPayload(_)
            | BulkError::RepositoryNotFound(_) => 400,
            BulkError::AuthFailed(_) => 403,
            BulkError::Backend(_) => 500,
        }
    }
}
