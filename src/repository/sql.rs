//! SQL backend: CRUD/query statement synthesis and row mapping.
//!
//! One `SqlBackend` serves every runtime database kind; the dialect strategy
//! supplies the fragments that differ between engines. Rows come back with
//! the engine's native typing and are re-typed against the registered field
//! definitions (booleans, timestamps) before reaching callers.

use std::sync::Arc;

use crate::connection::{BackendError, BackendResult, ConnectionManager};
use crate::dialect::{base_select, Dialect};
use crate::query::{Filter, Query, QueryResult};
use crate::record::{coerce, LogicalType, Record, Value, ID_FIELD};

use super::SchemaRef;

pub(crate) struct SqlBackend {
    table: String,
    dialect: Arc<dyn Dialect>,
    manager: Arc<ConnectionManager>,
    schema: SchemaRef,
}

impl SqlBackend {
    pub(crate) fn new(
        table: String,
        dialect: Arc<dyn Dialect>,
        manager: Arc<ConnectionManager>,
        schema: SchemaRef,
    ) -> Self {
        Self {
            table,
            dialect,
            manager,
            schema,
        }
    }

    pub(crate) fn insert(&self, record: &Record) -> BackendResult<()> {
        let mut columns = String::new();
        let mut placeholders = String::new();
        let mut params = Vec::with_capacity(record.len());
        for (i, (name, value)) in record.iter().enumerate() {
            if i > 0 {
                columns.push_str(", ");
                placeholders.push_str(", ");
            }
            columns.push_str(name);
            placeholders.push('?');
            params.push(value.clone());
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table, columns, placeholders
        );
        self.manager.with_connection(|conn| {
            conn.execute(&sql, &params)?;
            Ok(())
        })
    }

    pub(crate) fn update(&self, id: &str, record: &Record) -> BackendResult<()> {
        let mut assignments = String::new();
        let mut params = Vec::with_capacity(record.len());
        for (name, value) in record.iter().filter(|(name, _)| *name != ID_FIELD) {
            if !assignments.is_empty() {
                assignments.push_str(", ");
            }
            assignments.push_str(name);
            assignments.push_str(" = ?");
            params.push(value.clone());
        }
        if assignments.is_empty() {
            return Ok(());
        }
        params.push(Value::String(id.to_string()));

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            self.table, assignments, ID_FIELD
        );
        self.manager.with_connection(|conn| {
            conn.execute(&sql, &params)?;
            Ok(())
        })
    }

    pub(crate) fn delete(&self, id: &str) -> BackendResult<()> {
        let sql = format!("DELETE FROM {} WHERE {} = ?", self.table, ID_FIELD);
        let params = vec![Value::String(id.to_string())];
        self.manager.with_connection(|conn| {
            conn.execute(&sql, &params)?;
            Ok(())
        })
    }

    pub(crate) fn delete_matching(&self, filter: Option<&Filter>) -> BackendResult<()> {
        let mut sql = format!("DELETE FROM {}", self.table);
        let mut params = Vec::new();
        if let Some(filter) = filter {
            sql.push_str(" WHERE ");
            filter.to_sql(&mut sql, &mut params);
        }
        self.manager.with_connection(|conn| {
            conn.execute(&sql, &params)?;
            Ok(())
        })
    }

    pub(crate) fn fetch(&self, id: &str) -> BackendResult<Option<Record>> {
        let where_clause = format!("{} = ?", ID_FIELD);
        let sql = self
            .dialect
            .paged_select(&self.table, Some(&where_clause), None, 0, 1);
        let params = vec![Value::String(id.to_string())];
        let rows = self
            .manager
            .with_connection(|conn| conn.query(&sql, &params))?;
        Ok(rows.into_iter().next().map(|r| self.retype(r)))
    }

    pub(crate) fn exists(&self, id: &str) -> BackendResult<bool> {
        let filter = Filter::eq(ID_FIELD, id);
        Ok(self.count(Some(&filter))? > 0)
    }

    pub(crate) fn count(&self, filter: Option<&Filter>) -> BackendResult<u64> {
        let mut sql = format!("SELECT COUNT(*) AS cnt FROM {}", self.table);
        let mut params = Vec::new();
        if let Some(filter) = filter {
            sql.push_str(" WHERE ");
            filter.to_sql(&mut sql, &mut params);
        }
        let rows = self
            .manager
            .with_connection(|conn| conn.query(&sql, &params))?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::Execution("count returned no rows".into()))?;
        match row.get("cnt") {
            Some(Value::Integer(n)) => Ok(*n as u64),
            Some(Value::Double(d)) => Ok(*d as u64),
            _ => Err(BackendError::Execution("count returned no value".into())),
        }
    }

    pub(crate) fn query(&self, query: &Query) -> BackendResult<QueryResult> {
        let mut where_clause = None;
        let mut params = Vec::new();
        if let Some(filter) = query.get_filter() {
            let mut sql = String::new();
            filter.to_sql(&mut sql, &mut params);
            where_clause = Some(sql);
        }

        let total = self.count(query.get_filter())?;

        // A stable default order keeps page boundaries deterministic.
        let order_clause = if query.sorts().is_empty() {
            format!("{} ASC", ID_FIELD)
        } else {
            query
                .sorts()
                .iter()
                .map(|s| format!("{} {}", s.field, s.direction.sql()))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let (sql, page_count) = if query.is_paged() {
            let size = query.get_page_size();
            let offset = (query.page_num() - 1).saturating_mul(size);
            (
                self.dialect.paged_select(
                    &self.table,
                    where_clause.as_deref(),
                    Some(&order_clause),
                    offset,
                    size,
                ),
                total.div_ceil(size),
            )
        } else {
            (
                base_select(&self.table, where_clause.as_deref(), Some(&order_clause)),
                u64::from(total > 0),
            )
        };

        let rows = self
            .manager
            .with_connection(|conn| conn.query(&sql, &params))?;
        Ok(QueryResult {
            page_count,
            records: rows.into_iter().map(|r| self.retype(r)).collect(),
        })
    }

    pub(crate) fn select_raw(&self, sql: &str, params: &[Value]) -> BackendResult<Vec<Record>> {
        let rows = self.manager.with_connection(|conn| conn.query(sql, params))?;
        Ok(rows.into_iter().map(|r| self.retype(r)).collect())
    }

    pub(crate) fn random(&self, n: u64) -> BackendResult<Vec<Record>> {
        let sql = self.dialect.random_select(&self.table, n);
        let rows = self.manager.with_connection(|conn| conn.query(&sql, &[]))?;
        Ok(rows.into_iter().map(|r| self.retype(r)).collect())
    }

    /// Recover logical typing the engine's native types flattened away.
    fn retype(&self, mut record: Record) -> Record {
        let Some(fields) = self.schema.read().expect("schema lock poisoned").clone() else {
            return record;
        };

        for def in fields.iter() {
            let Some(value) = record.get(&def.name).cloned() else {
                continue;
            };
            match (def.logical_type, value) {
                (LogicalType::Boolean, Value::Integer(i)) => {
                    record.set(def.name.clone(), Value::Bool(i != 0));
                }
                (LogicalType::Date, Value::String(text)) => {
                    if let Some(ts) = coerce::parse_date(&text) {
                        record.set(def.name.clone(), Value::Timestamp(ts));
                    }
                }
                _ => {}
            }
        }
        record
    }
}
