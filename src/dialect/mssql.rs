//! MSSQL-flavored dialect.

use crate::config::RuntimeDatabase;
use crate::record::LogicalType;

use super::{base_select, ColumnMapping, Dialect};

/// Dialect for MSSQL-flavored backends.
pub struct MssqlDialect;

impl Dialect for MssqlDialect {
    fn kind(&self) -> RuntimeDatabase {
        RuntimeDatabase::Mssql
    }

    fn create_table_head(&self, sql: &mut String, table: &str) {
        sql.push_str("CREATE TABLE ");
        sql.push_str(table);
        sql.push_str(" (");
    }

    fn create_table_end(&self, sql: &mut String) {
        sql.push(')');
    }

    fn clear_table_sql(&self, table: &str, drop: bool) -> String {
        if drop {
            format!("DROP TABLE {}", table)
        } else {
            format!("TRUNCATE TABLE {}", table)
        }
    }

    fn default_type_mappings(&self) -> Vec<(LogicalType, ColumnMapping)> {
        vec![
            (LogicalType::String, ColumnMapping::with_length("NVARCHAR", 255)),
            (LogicalType::Text, ColumnMapping::plain("NVARCHAR(MAX)")),
            (LogicalType::Integer, ColumnMapping::plain("BIGINT")),
            (LogicalType::Double, ColumnMapping::plain("FLOAT")),
            (LogicalType::Boolean, ColumnMapping::plain("BIT")),
            (LogicalType::Date, ColumnMapping::plain("DATETIME2")),
        ]
    }

    fn paged_select(
        &self,
        table: &str,
        where_clause: Option<&str>,
        order_clause: Option<&str>,
        offset: u64,
        limit: u64,
    ) -> String {
        // OFFSET/FETCH requires an ORDER BY clause.
        let order = order_clause.unwrap_or("(SELECT NULL)");
        let mut sql = base_select(table, where_clause, Some(order));
        sql.push_str(&format!(
            " OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
            offset, limit
        ));
        sql
    }

    fn random_select(&self, table: &str, n: u64) -> String {
        format!("SELECT TOP {} * FROM {} ORDER BY NEWID()", n, table)
    }
}
