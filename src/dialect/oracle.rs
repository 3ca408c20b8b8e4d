//! Oracle-flavored dialect.

use crate::config::RuntimeDatabase;
use crate::record::LogicalType;

use super::{base_select, ColumnMapping, Dialect};

/// Dialect for Oracle-flavored backends.
pub struct OracleDialect;

impl Dialect for OracleDialect {
    fn kind(&self) -> RuntimeDatabase {
        RuntimeDatabase::Oracle
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
            (LogicalType::String, ColumnMapping::with_length("VARCHAR2", 255)),
            (LogicalType::Text, ColumnMapping::plain("CLOB")),
            (LogicalType::Integer, ColumnMapping::plain("NUMBER(19)")),
            (LogicalType::Double, ColumnMapping::plain("BINARY_DOUBLE")),
            (LogicalType::Boolean, ColumnMapping::plain("NUMBER(1)")),
            (LogicalType::Date, ColumnMapping::plain("TIMESTAMP")),
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
        // Classic ROWNUM window: the inner query establishes the order, the
        // outer pair applies the row bounds.
        let inner = base_select(table, where_clause, order_clause);
        format!(
            "SELECT * FROM (SELECT q.*, ROWNUM rn FROM ({}) q WHERE ROWNUM <= {}) WHERE rn > {}",
            inner,
            offset + limit,
            offset
        )
    }

    fn random_select(&self, table: &str, n: u64) -> String {
        format!(
            "SELECT * FROM (SELECT * FROM {} ORDER BY DBMS_RANDOM.VALUE) WHERE ROWNUM <= {}",
            table, n
        )
    }
}
