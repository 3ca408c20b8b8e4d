//! Connection and transaction management over pluggable drivers.

mod driver;
mod manager;
mod pool;

pub mod sqlite;

pub use driver::{BackendError, BackendResult, Driver, DriverConnection};
pub use manager::{ConnectionManager, Transaction, TransactionState};
pub use pool::{ConnectionPool, PooledConnection};
