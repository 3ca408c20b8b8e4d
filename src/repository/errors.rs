//! Repository error types.

use thiserror::Error;

use crate::connection::BackendError;

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Recoverable, caller-visible repository failure.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Write attempted while the repository is gated and the caller holds no
    /// privilege token.
    #[error("repository [{0}] is not writable at present")]
    NotWritable(String),

    /// No repository registered under the given name.
    #[error("repository [{0}] not found")]
    NotFound(String),

    /// The record does not fit the registered field definitions.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Underlying storage failure on a propagating call shape (writes,
    /// counts, DDL); read shapes degrade instead, see the facade.
    #[error(transparent)]
    Backend(#[from] BackendError),
}
