//! Bundled embedded driver over rusqlite.
//!
//! Supports an on-disk database file or a process-private shared in-memory
//! database. The in-memory form uses SQLite's shared-cache URI so that every
//! pooled connection observes the same data; an anchor connection held by the
//! driver keeps the database alive between checkouts.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::SecondsFormat;
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection, OpenFlags};
use uuid::Uuid;

use crate::record::{Record, Value};

use super::driver::{BackendError, BackendResult, Driver, DriverConnection};

/// Embedded SQL driver.
pub struct EmbeddedDriver {
    uri: String,
    anchor: Mutex<Option<Connection>>,
}

impl EmbeddedDriver {
    /// Open a shared in-memory database private to this driver instance.
    pub fn memory() -> BackendResult<Self> {
        let uri = format!(
            "file:stratum-{}?mode=memory&cache=shared",
            Uuid::new_v4().simple()
        );
        let driver = Self {
            uri,
            anchor: Mutex::new(None),
        };
        let anchor = driver.open()?;
        *driver.anchor.lock().expect("anchor lock poisoned") = Some(anchor);
        Ok(driver)
    }

    /// Open a database file at the given path.
    pub fn on_disk(path: impl AsRef<Path>) -> BackendResult<Self> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let uri = path
            .to_str()
            .ok_or_else(|| BackendError::Connect("database path is not valid UTF-8".into()))?
            .to_string();
        Ok(Self {
            uri,
            anchor: Mutex::new(None),
        })
    }

    fn open(&self) -> BackendResult<Connection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&self.uri, flags)
            .map_err(|e| BackendError::Connect(e.to_string()))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| BackendError::Connect(e.to_string()))?;
        Ok(conn)
    }
}

impl Driver for EmbeddedDriver {
    fn connect(&self) -> BackendResult<Box<dyn DriverConnection>> {
        Ok(Box::new(EmbeddedConnection { conn: self.open()? }))
    }

    fn shutdown(&self) {
        // Dropping the anchor lets an in-memory database be reclaimed.
        self.anchor.lock().expect("anchor lock poisoned").take();
    }
}

struct EmbeddedConnection {
    conn: Connection,
}

impl DriverConnection for EmbeddedConnection {
    fn execute(&mut self, sql: &str, params: &[Value]) -> BackendResult<u64> {
        let bound = params.iter().map(bind_value);
        self.conn
            .execute(sql, params_from_iter(bound))
            .map(|n| n as u64)
            .map_err(|e| BackendError::Execution(e.to_string()))
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> BackendResult<Vec<Record>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| BackendError::Execution(e.to_string()))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let bound = params.iter().map(bind_value);
        let mut rows = stmt
            .query(params_from_iter(bound))
            .map_err(|e| BackendError::Execution(e.to_string()))?;

        let mut records = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| BackendError::Execution(e.to_string()))?
        {
            let mut record = Record::new();
            for (i, column) in columns.iter().enumerate() {
                let value = row
                    .get_ref(i)
                    .map_err(|e| BackendError::Execution(e.to_string()))?;
                record.set(column.clone(), unbind_value(value));
            }
            records.push(record);
        }
        Ok(records)
    }

    fn begin(&mut self) -> BackendResult<()> {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| BackendError::Execution(e.to_string()))
    }

    fn commit(&mut self) -> BackendResult<()> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| BackendError::Execution(e.to_string()))
    }

    fn rollback(&mut self) -> BackendResult<()> {
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(|e| BackendError::Execution(e.to_string()))
    }
}

/// Map a record value onto the engine's native value set.
fn bind_value(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Bool(b) => rusqlite::types::Value::Integer(i64::from(*b)),
        Value::Integer(i) => rusqlite::types::Value::Integer(*i),
        Value::Double(d) => rusqlite::types::Value::Real(*d),
        Value::String(s) => rusqlite::types::Value::Text(s.clone()),
        Value::Timestamp(ts) => {
            rusqlite::types::Value::Text(ts.to_rfc3339_opts(SecondsFormat::Millis, true))
        }
        Value::Nested(v) => rusqlite::types::Value::Text(v.to_string()),
    }
}

/// Map a native column value back onto the record value set.
///
/// Type recovery beyond the engine's own types (booleans, timestamps) happens
/// in the repository layer against the registered field definitions.
fn unbind_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(d) => Value::Double(d),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_and_query_round_trip() {
        let driver = EmbeddedDriver::memory().unwrap();
        let mut conn = driver.connect().unwrap();

        conn.execute("CREATE TABLE t (id TEXT, n INTEGER)", &[])
            .unwrap();
        let affected = conn
            .execute(
                "INSERT INTO t (id, n) VALUES (?, ?)",
                &[Value::String("a".into()), Value::Integer(7)],
            )
            .unwrap();
        assert_eq!(affected, 1);

        let rows = conn.query("SELECT id, n FROM t", &[]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("id"), Some("a"));
        assert_eq!(rows[0].get("n").and_then(Value::as_i64), Some(7));
    }

    #[test]
    fn test_memory_database_is_shared_between_connections() {
        let driver = EmbeddedDriver::memory().unwrap();
        let mut a = driver.connect().unwrap();
        let mut b = driver.connect().unwrap();

        a.execute("CREATE TABLE shared (id TEXT)", &[]).unwrap();
        a.execute("INSERT INTO shared (id) VALUES (?)", &[Value::String("x".into())])
            .unwrap();

        let rows = b.query("SELECT id FROM shared", &[]).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_memory_databases_are_isolated_per_driver() {
        let first = EmbeddedDriver::memory().unwrap();
        let second = EmbeddedDriver::memory().unwrap();

        let mut a = first.connect().unwrap();
        a.execute("CREATE TABLE only_here (id TEXT)", &[]).unwrap();

        let mut b = second.connect().unwrap();
        assert!(b.query("SELECT id FROM only_here", &[]).is_err());
    }

    #[test]
    fn test_rollback_discards_writes() {
        let driver = EmbeddedDriver::memory().unwrap();
        let mut conn = driver.connect().unwrap();
        conn.execute("CREATE TABLE t (id TEXT)", &[]).unwrap();

        conn.begin().unwrap();
        conn.execute("INSERT INTO t (id) VALUES (?)", &[Value::String("x".into())])
            .unwrap();
        conn.rollback().unwrap();

        let rows = conn.query("SELECT id FROM t", &[]).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_execution_error_is_surfaced() {
        let driver = EmbeddedDriver::memory().unwrap();
        let mut conn = driver.connect().unwrap();
        let err = conn.execute("INSERT INTO missing VALUES (1)", &[]).unwrap_err();
        assert!(matches!(err, BackendError::Execution(_)));
    }
}
