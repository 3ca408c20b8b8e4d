//! MySQL-flavored dialect.

use crate::config::RuntimeDatabase;
use crate::record::LogicalType;

use super::{base_select, ColumnMapping, Dialect};

/// Dialect for MySQL-flavored backends.
pub struct MysqlDialect;

impl Dialect for MysqlDialect {
    fn kind(&self) -> RuntimeDatabase {
        RuntimeDatabase::Mysql
    }

    fn create_table_head(&self, sql: &mut String, table: &str) {
        sql.push_str("CREATE TABLE IF NOT EXISTS ");
        sql.push_str(table);
        sql.push_str(" (");
    }

    fn create_table_end(&self, sql: &mut String) {
        sql.push_str(") ENGINE=InnoDB DEFAULT CHARSET=utf8mb4");
    }

    fn clear_table_sql(&self, table: &str, drop: bool) -> String {
        if drop {
            format!("DROP TABLE IF EXISTS {}", table)
        } else {
            format!("TRUNCATE TABLE {}", table)
        }
    }

    fn default_type_mappings(&self) -> Vec<(LogicalType, ColumnMapping)> {
        vec![
            (LogicalType::String, ColumnMapping::with_length("VARCHAR", 255)),
            (LogicalType::Text, ColumnMapping::plain("TEXT")),
            (LogicalType::Integer, ColumnMapping::plain("BIGINT")),
            (LogicalType::Double, ColumnMapping::plain("DOUBLE")),
            (LogicalType::Boolean, ColumnMapping::plain("TINYINT(1)")),
            (LogicalType::Date, ColumnMapping::plain("DATETIME(3)")),
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
        format!("SELECT * FROM {} ORDER BY RAND() LIMIT {}", table, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldDefinition;

    #[test]
    fn test_create_table_fragments() {
        let mut sql = String::new();
        MysqlDialect.create_table_head(&mut sql, "sym_article");
        sql.push_str("id VARCHAR(19)");
        MysqlDialect.create_table_end(&mut sql);
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS sym_article (id VARCHAR(19)) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"
        );
    }

    #[test]
    fn test_boolean_maps_to_tinyint() {
        let mappings = MysqlDialect.default_type_mappings();
        let (_, mapping) = mappings
            .iter()
            .find(|(t, _)| *t == LogicalType::Boolean)
            .unwrap();
        assert_eq!(
            mapping.column_sql(&FieldDefinition::boolean("flag")),
            "flag TINYINT(1)"
        );
    }

    #[test]
    fn test_truncate_table() {
        assert_eq!(
            MysqlDialect.clear_table_sql("t", false),
            "TRUNCATE TABLE t"
        );
    }
}
