//! Engine Configuration
//!
//! Runtime database selection, pool and cache sizing, table prefixing, and
//! the optional remote bulk-interface credentials. Configuration errors are
//! fatal: the engine refuses to construct rather than limping along.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal configuration failure at engine construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configured runtime database name is not in the supported set.
    #[error("unsupported runtime database [{0}]")]
    UnsupportedRuntime(String),

    /// A server-backed runtime database was selected without injecting a
    /// driver for it.
    #[error("no driver registered for runtime database [{0}]")]
    MissingDriver(RuntimeDatabase),

    /// The bundled embedded driver failed to open.
    #[error("embedded driver startup failed: {0}")]
    Driver(String),
}

/// The supported backend kinds, selected once at engine construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeDatabase {
    /// MySQL-flavored server backend.
    Mysql,
    /// Bundled embedded backend.
    Embedded,
    /// MSSQL-flavored server backend.
    Mssql,
    /// Oracle-flavored server backend.
    Oracle,
}

impl RuntimeDatabase {
    /// Name used in configuration files and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            RuntimeDatabase::Mysql => "mysql",
            RuntimeDatabase::Embedded => "embedded",
            RuntimeDatabase::Mssql => "mssql",
            RuntimeDatabase::Oracle => "oracle",
        }
    }
}

impl std::fmt::Display for RuntimeDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for RuntimeDatabase {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" => Ok(RuntimeDatabase::Mysql),
            "embedded" => Ok(RuntimeDatabase::Embedded),
            "mssql" => Ok(RuntimeDatabase::Mssql),
            "oracle" => Ok(RuntimeDatabase::Oracle),
            other => Err(ConfigError::UnsupportedRuntime(other.to_string())),
        }
    }
}

/// Credentials and bind address for the remote bulk-data interface.
///
/// When absent from [`RuntimeConfig`], every remote call fails with
/// "not implemented".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Remote accessor user name.
    pub user_name: String,
    /// Remote accessor password.
    pub password: String,
    /// Host to bind to (default: "0.0.0.0").
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to (default: 7099).
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    7099
}

impl RemoteConfig {
    /// Create a remote config with the given credentials and default bind
    /// address.
    pub fn new(user_name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            password: password.into(),
            host: default_host(),
            port: default_port(),
        }
    }

    /// Get the socket address string.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Which backend kind to run against.
    #[serde(default = "default_runtime_database")]
    pub runtime_database: RuntimeDatabase,

    /// Prefix prepended (with an underscore) to every backing table name.
    #[serde(default)]
    pub table_prefix: Option<String>,

    /// Database file for the embedded backend; in-memory when absent.
    #[serde(default)]
    pub embedded_path: Option<PathBuf>,

    /// Maximum open connections (default: 8).
    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: usize,

    /// Per-repository cache capacity in entries (default: 1024).
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Remote bulk-interface settings; the interface is disabled when absent.
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
}

fn default_runtime_database() -> RuntimeDatabase {
    RuntimeDatabase::Embedded
}

fn default_pool_capacity() -> usize {
    8
}

fn default_cache_capacity() -> usize {
    1024
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            runtime_database: default_runtime_database(),
            table_prefix: None,
            embedded_path: None,
            pool_capacity: default_pool_capacity(),
            cache_capacity: default_cache_capacity(),
            remote: None,
        }
    }
}

impl RuntimeConfig {
    /// Config for an in-memory embedded engine.
    pub fn embedded() -> Self {
        Self::default()
    }

    /// Select the runtime database kind.
    pub fn with_runtime_database(mut self, kind: RuntimeDatabase) -> Self {
        self.runtime_database = kind;
        self
    }

    /// Set the table name prefix.
    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = Some(prefix.into());
        self
    }

    /// Set the per-repository cache capacity.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Enable the remote bulk interface.
    pub fn with_remote(mut self, remote: RemoteConfig) -> Self {
        self.remote = Some(remote);
        self
    }

    /// The backing table name for a repository name, prefix applied.
    pub fn table_name(&self, repository_name: &str) -> String {
        match &self.table_prefix {
            Some(prefix) => format!("{}_{}", prefix, repository_name),
            None => repository_name.to_string(),
        }
    }

    /// Strip the configured prefix from an incoming repository name.
    pub fn strip_table_prefix<'a>(&self, repository_name: &'a str) -> &'a str {
        match &self.table_prefix {
            Some(prefix) => repository_name
                .strip_prefix(&format!("{}_", prefix))
                .unwrap_or(repository_name),
            None => repository_name,
        }
    }
}
