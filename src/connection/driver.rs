//! Driver abstraction over concrete database engines.
//!
//! A [`Driver`] opens connections; a [`DriverConnection`] executes
//! parameterized statements. The crate bundles an embedded driver
//! ([`super::sqlite::EmbeddedDriver`]); server-backed engines plug in the
//! same way and are registered on the engine at construction.

use thiserror::Error;

use crate::record::{Record, Value};

/// Failure of an underlying storage operation.
///
/// Write paths propagate these; the repository facade absorbs them on read
/// paths (see `repository`).
#[derive(Debug, Error)]
pub enum BackendError {
    /// Statement execution or row decoding failed.
    #[error("statement execution failed: {0}")]
    Execution(String),

    /// Opening a connection failed.
    #[error("driver connection failed: {0}")]
    Connect(String),

    /// The pool was shut down while a caller was waiting.
    #[error("connection pool is shut down")]
    PoolClosed,

    /// Commit/rollback on a transaction that already completed.
    #[error("transaction is no longer active")]
    TransactionInactive,
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// One open connection to the backing engine.
///
/// Connections are exclusively owned while checked out of the pool, so the
/// methods take `&mut self`; implementations need no internal locking.
pub trait DriverConnection: Send {
    /// Execute a statement that returns no rows; yields the affected count.
    fn execute(&mut self, sql: &str, params: &[Value]) -> BackendResult<u64>;

    /// Execute a row-returning statement.
    fn query(&mut self, sql: &str, params: &[Value]) -> BackendResult<Vec<Record>>;

    /// Begin a transaction on this connection.
    fn begin(&mut self) -> BackendResult<()>;

    /// Commit the in-flight transaction.
    fn commit(&mut self) -> BackendResult<()>;

    /// Roll back the in-flight transaction.
    fn rollback(&mut self) -> BackendResult<()>;
}

/// Factory for [`DriverConnection`]s, one per configured engine.
pub trait Driver: Send + Sync {
    /// Open a new connection.
    fn connect(&self) -> BackendResult<Box<dyn DriverConnection>>;

    /// Release driver-level resources at process teardown.
    fn shutdown(&self) {}
}
