//! Engine: the root object wiring configuration, driver, dialect,
//! connection manager, schema solution, and the repository registry.
//!
//! One engine per database. Repositories are created lazily by name and
//! shared behind `Arc`; the engine owns nothing process-global, so two
//! engines with different configurations coexist in one process.

use std::sync::{Arc, Mutex, RwLock};

use crate::config::{ConfigError, RuntimeConfig, RuntimeDatabase};
use crate::connection::sqlite::EmbeddedDriver;
use crate::connection::{ConnectionManager, Driver};
use crate::dialect::{dialect_for, DatabaseSolution, SolutionError};
use crate::record::FieldDefinition;
use crate::repository::{Repository, RepositoryRegistry, SqlBackend};

/// The root engine object.
pub struct Engine {
    config: RuntimeConfig,
    manager: Arc<ConnectionManager>,
    registry: RepositoryRegistry,
    solution: DatabaseSolution,
    creation: Mutex<()>,
}

impl Engine {
    /// Construct an engine from configuration.
    ///
    /// Only the embedded runtime database ships with a bundled driver;
    /// server backends need a driver injected via [`Engine::with_driver`].
    pub fn new(config: RuntimeConfig) -> Result<Self, ConfigError> {
        let driver: Arc<dyn Driver> = match config.runtime_database {
            RuntimeDatabase::Embedded => {
                let driver = match &config.embedded_path {
                    Some(path) => EmbeddedDriver::on_disk(path),
                    None => EmbeddedDriver::memory(),
                }
                .map_err(|e| ConfigError::Driver(e.to_string()))?;
                Arc::new(driver)
            }
            other => return Err(ConfigError::MissingDriver(other)),
        };
        Ok(Self::with_driver(config, driver))
    }

    /// Construct an engine over an injected driver. The dialect follows the
    /// configured runtime database, not the driver.
    pub fn with_driver(config: RuntimeConfig, driver: Arc<dyn Driver>) -> Self {
        let manager = Arc::new(ConnectionManager::new(driver, config.pool_capacity));
        let dialect = dialect_for(config.runtime_database);
        let solution = DatabaseSolution::new(dialect, Arc::clone(&manager));
        log::info!(
            "engine starting, runtime database [{}]",
            config.runtime_database
        );
        Self {
            config,
            manager,
            registry: RepositoryRegistry::new(),
            solution,
            creation: Mutex::new(()),
        }
    }

    /// Get the repository for an entity name, creating and registering it
    /// on first use.
    pub fn repository(&self, name: &str) -> Arc<Repository> {
        if let Some(existing) = self.registry.get(name) {
            return existing;
        }

        let _guard = self.creation.lock().expect("creation lock poisoned");
        if let Some(existing) = self.registry.get(name) {
            return existing;
        }

        let schema = Arc::new(RwLock::new(self.registry.schema(name)));
        let backend = SqlBackend::new(
            self.config.table_name(name),
            Arc::clone(self.solution.dialect()),
            Arc::clone(&self.manager),
            Arc::clone(&schema),
        );
        let repository = Arc::new(Repository::new(
            name.to_string(),
            backend,
            Arc::clone(&self.manager),
            self.config.cache_capacity,
            schema,
        ));
        if !self.registry.all_writable() {
            repository.set_writable(false);
        }
        self.registry.register(Arc::clone(&repository));
        repository
    }

    /// Register field definitions for an entity name, updating the live
    /// repository if one already exists.
    pub fn register_schema(&self, name: impl Into<String>, fields: Vec<FieldDefinition>) {
        let name = name.into();
        self.registry.set_schema(name.clone(), fields);
        if let Some(repository) = self.registry.get(&name) {
            if let Some(schema) = self.registry.schema(&name) {
                repository.set_schema(schema);
            }
        }
    }

    /// Create the backing table for every registered schema.
    pub fn create_all_tables(&self) -> Result<(), SolutionError> {
        for (name, fields) in self.registry.schemas() {
            self.solution
                .create_table(&self.config.table_name(&name), &fields)?;
        }
        Ok(())
    }

    /// Drain the connection pool and release the driver.
    pub fn shutdown(&self) {
        log::info!("engine shutting down");
        self.manager.shutdown();
    }

    /// The engine configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The repository registry.
    pub fn registry(&self) -> &RepositoryRegistry {
        &self.registry
    }

    /// Schema lifecycle operations.
    pub fn solution(&self) -> &DatabaseSolution {
        &self.solution
    }

    /// The connection and transaction manager.
    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteConfig;

    #[test]
    fn test_repository_is_created_once() {
        let engine = Engine::new(RuntimeConfig::embedded()).unwrap();
        let a = engine.repository("article");
        let b = engine.repository("article");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(engine.registry().names(), vec!["article".to_string()]);
    }

    #[test]
    fn test_server_backend_without_driver_is_rejected() {
        let config = RuntimeConfig::embedded().with_runtime_database(RuntimeDatabase::Mysql);
        assert!(matches!(
            Engine::new(config),
            Err(ConfigError::MissingDriver(RuntimeDatabase::Mysql))
        ));
    }

    #[test]
    fn test_register_schema_updates_live_repository() {
        let engine = Engine::new(RuntimeConfig::embedded()).unwrap();
        let repository = engine.repository("user");
        assert!(repository.schema().is_none());
        engine.register_schema("user", vec![FieldDefinition::string("name", 32)]);
        assert_eq!(repository.schema().unwrap().len(), 1);
    }

    #[test]
    fn test_create_all_tables_covers_registered_schemas() {
        let engine = Engine::new(RuntimeConfig::embedded().with_table_prefix("b3")).unwrap();
        engine.register_schema(
            "user",
            vec![
                FieldDefinition::string("id", 19).required(),
                FieldDefinition::string("name", 32),
            ],
        );
        engine.create_all_tables().unwrap();

        let rows = engine
            .manager()
            .with_connection(|conn| conn.query("SELECT * FROM b3_user", &[]))
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_new_repository_inherits_global_write_gate() {
        let engine = Engine::new(RuntimeConfig::embedded()).unwrap();
        engine.registry().set_all_writable(false);
        let repository = engine.repository("comment");
        assert!(!repository.is_writable());
    }

    #[test]
    fn test_remote_config_is_carried() {
        let config = RuntimeConfig::embedded().with_remote(RemoteConfig::new("op", "secret"));
        let engine = Engine::new(config).unwrap();
        assert!(engine.config().remote.is_some());
    }
}
