//! stratum - A database-agnostic repository and caching engine

pub mod bulk;
pub mod cache;
pub mod config;
pub mod connection;
pub mod dialect;
pub mod engine;
pub mod query;
pub mod record;
pub mod repository;

pub use config::{RemoteConfig, RuntimeConfig, RuntimeDatabase};
pub use engine::Engine;
pub use query::{Filter, Query, QueryResult, Sort, SortDirection};
pub use record::{FieldDefinition, LogicalType, Record, Value};
pub use repository::{Repository, RepositoryError, RepositoryResult};
