//! Backend database solution: dialect-correct DDL synthesis and execution.
//!
//! The solution composes a [`Dialect`] strategy with the type-mapping
//! registry and the connection manager. DDL is administrative: every
//! execution failure is surfaced to the caller, never absorbed.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::connection::{BackendError, ConnectionManager};
use crate::record::{FieldDefinition, LogicalType};

use super::{ColumnMapping, Dialect};

/// DDL synthesis or execution failure.
#[derive(Debug, Error)]
pub enum SolutionError {
    /// A field's logical type has no registered native mapping.
    #[error("no column mapping registered for logical type [{0}]")]
    UnmappedType(LogicalType),

    /// The backend rejected the DDL statement.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Schema lifecycle operations for one engine.
pub struct DatabaseSolution {
    dialect: Arc<dyn Dialect>,
    manager: Arc<ConnectionManager>,
    mappings: RwLock<HashMap<LogicalType, ColumnMapping>>,
}

impl DatabaseSolution {
    /// Create a solution seeded with the dialect's default type mappings.
    pub fn new(dialect: Arc<dyn Dialect>, manager: Arc<ConnectionManager>) -> Self {
        let mappings = dialect.default_type_mappings().into_iter().collect();
        Self {
            dialect,
            manager,
            mappings: RwLock::new(mappings),
        }
    }

    /// Install or override a logical-to-native type mapping. The last
    /// registration for a logical type wins.
    pub fn register_type(&self, logical: LogicalType, mapping: ColumnMapping) {
        self.mappings
            .write()
            .expect("mapping lock poisoned")
            .insert(logical, mapping);
    }

    /// Synthesize the CREATE TABLE statement for the given fields.
    pub fn build_create_table(
        &self,
        table: &str,
        fields: &[FieldDefinition],
    ) -> Result<String, SolutionError> {
        let mappings = self.mappings.read().expect("mapping lock poisoned");

        let mut sql = String::new();
        self.dialect.create_table_head(&mut sql, table);
        for (i, def) in fields.iter().enumerate() {
            let mapping = mappings
                .get(&def.logical_type)
                .ok_or(SolutionError::UnmappedType(def.logical_type))?;
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&mapping.column_sql(def));
        }
        self.dialect.create_table_end(&mut sql);
        Ok(sql)
    }

    /// Create a table for the given field definitions.
    pub fn create_table(
        &self,
        table: &str,
        fields: &[FieldDefinition],
    ) -> Result<(), SolutionError> {
        let sql = self.build_create_table(table, fields)?;
        log::info!("creating table [{}]", table);
        self.manager.with_connection(|conn| {
            conn.execute(&sql, &[])?;
            Ok(())
        })?;
        Ok(())
    }

    /// Clear a table: drop it when `drop` is set, empty it otherwise.
    pub fn clear_table(&self, table: &str, drop: bool) -> Result<(), SolutionError> {
        let sql = self.dialect.clear_table_sql(table, drop);
        log::info!("clearing table [{}] drop={}", table, drop);
        self.manager.with_connection(|conn| {
            conn.execute(&sql, &[])?;
            Ok(())
        })?;
        Ok(())
    }

    /// The dialect this solution synthesizes for.
    pub fn dialect(&self) -> &Arc<dyn Dialect> {
        &self.dialect
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeDatabase;
    use crate::connection::sqlite::EmbeddedDriver;
    use crate::dialect::dialect_for;
    use crate::record::Value;

    fn solution() -> (DatabaseSolution, Arc<ConnectionManager>) {
        let driver = Arc::new(EmbeddedDriver::memory().unwrap());
        let manager = Arc::new(ConnectionManager::new(driver, 2));
        let dialect = dialect_for(RuntimeDatabase::Embedded);
        (
            DatabaseSolution::new(dialect, Arc::clone(&manager)),
            manager,
        )
    }

    fn user_fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::string("id", 19).required(),
            FieldDefinition::string("name", 64),
            FieldDefinition::date("joined"),
        ]
    }

    #[test]
    fn test_build_create_table_iterates_fields_in_order() {
        let (solution, _) = solution();
        let sql = solution.build_create_table("users", &user_fields()).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS users (id VARCHAR(19) NOT NULL, name VARCHAR(64), joined TIMESTAMP)"
        );
    }

    #[test]
    fn test_register_type_last_wins() {
        let (solution, _) = solution();
        solution.register_type(LogicalType::Date, ColumnMapping::plain("DATETIME"));
        solution.register_type(LogicalType::Date, ColumnMapping::plain("TEXT"));
        let sql = solution
            .build_create_table("t", &[FieldDefinition::date("d")])
            .unwrap();
        assert_eq!(sql, "CREATE TABLE IF NOT EXISTS t (d TEXT)");
    }

    #[test]
    fn test_create_and_clear_table_execute() {
        let (solution, manager) = solution();
        solution.create_table("users", &user_fields()).unwrap();

        manager
            .with_connection(|conn| {
                conn.execute(
                    "INSERT INTO users (id) VALUES (?)",
                    &[Value::String("u1".into())],
                )
            })
            .unwrap();

        solution.clear_table("users", false).unwrap();
        let rows = manager
            .with_connection(|conn| conn.query("SELECT * FROM users", &[]))
            .unwrap();
        assert!(rows.is_empty());

        solution.clear_table("users", true).unwrap();
        assert!(manager
            .with_connection(|conn| conn.query("SELECT * FROM users", &[]))
            .is_err());
    }

    #[test]
    fn test_ddl_failure_is_surfaced() {
        let (solution, _) = solution();
        let err = solution.clear_table("no_such_table", false).unwrap_err();
        assert!(matches!(err, SolutionError::Backend(_)));
    }
}
