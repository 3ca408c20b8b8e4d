//! Embedded (bundled SQL engine) dialect.

use crate::config::RuntimeDatabase;
use crate::record::LogicalType;

use super::{base_select, ColumnMapping, Dialect};

/// Dialect for the bundled embedded engine.
pub struct EmbeddedDialect;

impl Dialect for EmbeddedDialect {
    fn kind(&self) -> RuntimeDatabase {
        RuntimeDatabase::Embedded
    }

    fn create_table_head(&self, sql: &mut String, table: &str) {
        sql.push_str("CREATE TABLE IF NOT EXISTS ");
        sql.push_str(table);
        sql.push_str(" (");
    }

    fn create_table_end(&self, sql: &mut String) {
        sql.push(')');
    }

    fn clear_table_sql(&self, table: &str, drop: bool) -> String {
        if drop {
            format!("DROP TABLE IF EXISTS {}", table)
        } else {
            // The embedded engine has no TRUNCATE.
            format!("DELETE FROM {}", table)
        }
    }

    fn default_type_mappings(&self) -> Vec<(LogicalType, ColumnMapping)> {
        vec![
            (LogicalType::String, ColumnMapping::with_length("VARCHAR", 255)),
            (LogicalType::Text, ColumnMapping::plain("TEXT")),
            (LogicalType::Integer, ColumnMapping::plain("INTEGER")),
            (LogicalType::Double, ColumnMapping::plain("REAL")),
            (LogicalType::Boolean, ColumnMapping::plain("BOOLEAN")),
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
        let mut sql = base_select(table, where_clause, order_clause);
        sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
        sql
    }

    fn random_select(&self, table: &str, n: u64) -> String {
        format!("SELECT * FROM {} ORDER BY RANDOM() LIMIT {}", table, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paged_select_shape() {
        let sql = EmbeddedDialect.paged_select("t", Some("a = ?"), Some("b DESC"), 20, 10);
        assert_eq!(
            sql,
            "SELECT * FROM t WHERE a = ? ORDER BY b DESC LIMIT 10 OFFSET 20"
        );
    }

    #[test]
    fn test_clear_table_without_drop_deletes_rows() {
        assert_eq!(EmbeddedDialect.clear_table_sql("t", false), "DELETE FROM t");
        assert_eq!(
            EmbeddedDialect.clear_table_sql("t", true),
            "DROP TABLE IF EXISTS t"
        );
    }
}
