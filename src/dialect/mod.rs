//! SQL dialect strategies.
//!
//! Each supported backend kind contributes a [`Dialect`]: DDL fragments
//! (create-table head/end, clear-table), a default logical-to-native type
//! mapping, and the paging/random SELECT shapes that differ between engines.
//! Dialects are pure string synthesis; execution happens elsewhere.

mod embedded;
mod mssql;
mod mysql;
mod oracle;

pub mod solution;

pub use embedded::EmbeddedDialect;
pub use mssql::MssqlDialect;
pub use mysql::MysqlDialect;
pub use oracle::OracleDialect;
pub use solution::{DatabaseSolution, SolutionError};

use std::sync::Arc;

use crate::config::RuntimeDatabase;
use crate::record::{FieldDefinition, LogicalType};

/// Mapping from a logical type to a native column type.
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    native: String,
    /// Whether the native type takes a length parameter.
    parameterized: bool,
    default_length: u32,
}

impl ColumnMapping {
    /// A native type without a length parameter.
    pub fn plain(native: impl Into<String>) -> Self {
        Self {
            native: native.into(),
            parameterized: false,
            default_length: 0,
        }
    }

    /// A native type taking a length parameter, e.g. `VARCHAR(n)`.
    pub fn with_length(native: impl Into<String>, default_length: u32) -> Self {
        Self {
            native: native.into(),
            parameterized: true,
            default_length,
        }
    }

    /// Render the column clause for one field definition.
    pub fn column_sql(&self, def: &FieldDefinition) -> String {
        let mut sql = format!("{} {}", def.name, self.native);
        if self.parameterized {
            let length = def.length.unwrap_or(self.default_length);
            sql.push_str(&format!("({})", length));
        }
        if !def.nullable {
            sql.push_str(" NOT NULL");
        }
        sql
    }
}

/// Per-backend SQL synthesis strategy.
pub trait Dialect: Send + Sync {
    /// The backend kind this dialect serves.
    fn kind(&self) -> RuntimeDatabase;

    /// Append the CREATE TABLE head fragment.
    fn create_table_head(&self, sql: &mut String, table: &str);

    /// Append the CREATE TABLE end fragment.
    fn create_table_end(&self, sql: &mut String);

    /// Statement clearing a table: drop it, or empty it in place.
    fn clear_table_sql(&self, table: &str, drop: bool) -> String;

    /// Default logical-to-native type mappings for this backend.
    fn default_type_mappings(&self) -> Vec<(LogicalType, ColumnMapping)>;

    /// A SELECT over one page of rows.
    ///
    /// `offset`/`limit` are row positions, already derived from the page
    /// descriptor. Clauses arrive pre-rendered (`where_clause` without the
    /// `WHERE` keyword, `order_clause` without `ORDER BY`).
    fn paged_select(
        &self,
        table: &str,
        where_clause: Option<&str>,
        order_clause: Option<&str>,
        offset: u64,
        limit: u64,
    ) -> String;

    /// A SELECT of `n` rows in random order.
    fn random_select(&self, table: &str, n: u64) -> String;
}

/// Resolve the dialect for a backend kind. The set is closed; adding a kind
/// means adding a dialect.
pub fn dialect_for(kind: RuntimeDatabase) -> Arc<dyn Dialect> {
    match kind {
        RuntimeDatabase::Mysql => Arc::new(MysqlDialect),
        RuntimeDatabase::Embedded => Arc::new(EmbeddedDialect),
        RuntimeDatabase::Mssql => Arc::new(MssqlDialect),
        RuntimeDatabase::Oracle => Arc::new(OracleDialect),
    }
}

/// Shared SELECT assembly for dialects with plain `WHERE`/`ORDER BY` shapes.
pub(crate) fn base_select(
    table: &str,
    where_clause: Option<&str>,
    order_clause: Option<&str>,
) -> String {
    let mut sql = format!("SELECT * FROM {}", table);
    if let Some(w) = where_clause {
        sql.push_str(" WHERE ");
        sql.push_str(w);
    }
    if let Some(o) = order_clause {
        sql.push_str(" ORDER BY ");
        sql.push_str(o);
    }
    sql
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_sql_with_length_and_not_null() {
        let mapping = ColumnMapping::with_length("VARCHAR", 255);
        let def = FieldDefinition::string("name", 64).required();
        assert_eq!(mapping.column_sql(&def), "name VARCHAR(64) NOT NULL");
    }

    #[test]
    fn test_column_sql_falls_back_to_default_length() {
        let mapping = ColumnMapping::with_length("VARCHAR", 255);
        let def = FieldDefinition::new("name", LogicalType::String);
        assert_eq!(mapping.column_sql(&def), "name VARCHAR(255)");
    }

    #[test]
    fn test_column_sql_plain() {
        let mapping = ColumnMapping::plain("BIGINT");
        let def = FieldDefinition::integer("count");
        assert_eq!(mapping.column_sql(&def), "count BIGINT");
    }

    #[test]
    fn test_dialect_for_covers_all_kinds() {
        for kind in [
            RuntimeDatabase::Mysql,
            RuntimeDatabase::Embedded,
            RuntimeDatabase::Mssql,
            RuntimeDatabase::Oracle,
        ] {
            assert_eq!(dialect_for(kind).kind(), kind);
        }
    }

    #[test]
    fn test_every_dialect_maps_every_logical_type() {
        let all = [
            LogicalType::String,
            LogicalType::Text,
            LogicalType::Integer,
            LogicalType::Double,
            LogicalType::Boolean,
            LogicalType::Date,
        ];
        for kind in [
            RuntimeDatabase::Mysql,
            RuntimeDatabase::Embedded,
            RuntimeDatabase::Mssql,
            RuntimeDatabase::Oracle,
        ] {
            let mappings = dialect_for(kind).default_type_mappings();
            for logical in all {
                assert!(
                    mappings.iter().any(|(t, _)| *t == logical),
                    "{} lacks mapping for {}",
                    kind,
                    logical
                );
            }
        }
    }
}
