//! Repository facade: caching, the write gate, and read degradation.
//!
//! Every entity kind gets one [`Repository`]. Writes pass through a runtime
//! gate (the `writable` flag); holders of a [`PrivilegeToken`] bypass the
//! gate for administrative flows such as batch import. Point reads go
//! through the per-repository [`RecordCache`]; read-shaped calls degrade to
//! empty results on backend failure so presentation code can render partial
//! pages instead of erroring out.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::cache::RecordCache;
use crate::connection::{BackendResult, ConnectionManager, Transaction};
use crate::query::{Filter, Query, QueryResult};
use crate::record::{coerce, FieldDefinition, Record, Value, ID_FIELD};

pub mod errors;
pub mod registry;
mod sql;

pub use errors::{RepositoryError, RepositoryResult};
pub use registry::RepositoryRegistry;

pub(crate) use sql::SqlBackend;

/// Shared handle to a repository's registered field definitions. `None`
/// until a schema is registered; coercion and validation are skipped
/// without one.
pub(crate) type SchemaRef = Arc<RwLock<Option<Arc<Vec<FieldDefinition>>>>>;

/// Capability that authorizes writes to a gated repository.
///
/// Only crate-internal administrative flows can mint one; handing a token
/// out is an explicit decision, never something a caller can reconstruct.
pub struct PrivilegeToken(());

impl PrivilegeToken {
    pub(crate) fn new() -> Self {
        Self(())
    }
}

/// One entity kind's storage facade.
pub struct Repository {
    name: String,
    backend: SqlBackend,
    manager: Arc<ConnectionManager>,
    writable: AtomicBool,
    cache: RecordCache,
    schema: SchemaRef,
    read_failures: AtomicU64,
}

impl Repository {
    pub(crate) fn new(
        name: String,
        backend: SqlBackend,
        manager: Arc<ConnectionManager>,
        cache_capacity: usize,
        schema: SchemaRef,
    ) -> Self {
        Self {
            name,
            backend,
            manager,
            writable: AtomicBool::new(true),
            cache: RecordCache::new(cache_capacity),
            schema,
            read_failures: AtomicU64::new(0),
        }
    }

    /// Repository name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether writes are currently accepted.
    pub fn is_writable(&self) -> bool {
        self.writable.load(Ordering::SeqCst)
    }

    /// Open or close the write gate.
    pub fn set_writable(&self, writable: bool) {
        self.writable.store(writable, Ordering::SeqCst);
    }

    /// Number of read-shaped calls that degraded to an empty result.
    pub fn read_failure_count(&self) -> u64 {
        self.read_failures.load(Ordering::SeqCst)
    }

    /// The per-repository record cache.
    pub fn cache(&self) -> &RecordCache {
        &self.cache
    }

    /// The registered field definitions, if any.
    pub fn schema(&self) -> Option<Arc<Vec<FieldDefinition>>> {
        self.schema.read().expect("schema lock poisoned").clone()
    }

    pub(crate) fn set_schema(&self, fields: Arc<Vec<FieldDefinition>>) {
        *self.schema.write().expect("schema lock poisoned") = Some(fields);
    }

    fn ensure_writable(&self) -> RepositoryResult<()> {
        if self.is_writable() {
            Ok(())
        } else {
            Err(RepositoryError::NotWritable(self.name.clone()))
        }
    }

    /// Assign an id when absent, validate against the registered fields and
    /// coerce boundary values into their declared shapes.
    fn normalize(&self, record: &mut Record) -> RepositoryResult<String> {
        let id = match record.get_str(ID_FIELD) {
            Some(id) => id.to_string(),
            None => {
                let id = uuid::Uuid::new_v4().simple().to_string();
                record.set(ID_FIELD, id.clone());
                id
            }
        };

        if let Some(fields) = self.schema() {
            for (name, value) in record.iter() {
                if name != ID_FIELD && !fields.iter().any(|def| def.name == *name) {
                    return Err(RepositoryError::InvalidRecord(format!(
                        "unknown field [{}] in repository [{}]",
                        name, self.name
                    )));
                }
                if matches!(value, Value::Null) {
                    if let Some(def) = fields.iter().find(|def| def.name == *name) {
                        if !def.nullable {
                            return Err(RepositoryError::InvalidRecord(format!(
                                "field [{}] must not be null",
                                name
                            )));
                        }
                    }
                }
            }
            for def in fields.iter().filter(|def| !def.nullable) {
                if def.name != ID_FIELD && !record.contains(&def.name) {
                    return Err(RepositoryError::InvalidRecord(format!(
                        "missing required field [{}]",
                        def.name
                    )));
                }
            }
            coerce::coerce_record(record, &fields)
                .map_err(|e| RepositoryError::InvalidRecord(e.to_string()))?;
        }

        Ok(id)
    }

    fn do_add(&self, mut record: Record) -> RepositoryResult<String> {
        let id = self.normalize(&mut record)?;
        self.backend.insert(&record)?;
        self.cache.remove(&id);
        Ok(id)
    }

    fn do_update(&self, id: &str, mut record: Record) -> RepositoryResult<()> {
        record.set(ID_FIELD, id);
        self.normalize(&mut record)?;
        self.backend.update(id, &record)?;
        self.cache.remove(id);
        Ok(())
    }

    fn do_remove(&self, id: &str) -> RepositoryResult<()> {
        self.backend.delete(id)?;
        self.cache.remove(id);
        Ok(())
    }

    /// Insert a record, assigning an id when the record carries none.
    /// Returns the record's id.
    pub fn add(&self, record: Record) -> RepositoryResult<String> {
        self.ensure_writable()?;
        self.do_add(record)
    }

    /// Replace the record stored under `id`.
    pub fn update(&self, id: &str, record: Record) -> RepositoryResult<()> {
        self.ensure_writable()?;
        self.do_update(id, record)
    }

    /// Delete the record stored under `id`.
    pub fn remove(&self, id: &str) -> RepositoryResult<()> {
        self.ensure_writable()?;
        self.do_remove(id)
    }

    /// Delete every record matching the query's filter, or every record
    /// when the query carries none. The query's page and sort settings are
    /// ignored; deletion is whole-match.
    pub fn remove_matching(&self, query: &Query) -> RepositoryResult<()> {
        self.ensure_writable()?;
        self.backend.delete_matching(query.get_filter())?;
        self.cache.full().clear();
        self.cache.derived().clear();
        Ok(())
    }

    /// Point read through the cache. Backend failure degrades to `None`.
    pub fn get(&self, id: &str) -> Option<Record> {
        if let Some(record) = self.cache.get(id) {
            return Some(record);
        }
        match self.backend.fetch(id) {
            Ok(Some(record)) => {
                // A read over a bound transaction may observe writes that
                // later roll back; such rows must not enter the cache.
                if !self.manager.has_transaction_begun() {
                    self.cache.put(id, &record);
                }
                Some(record)
            }
            Ok(None) => None,
            Err(e) => {
                self.note_read_failure("get", &e);
                None
            }
        }
    }

    /// Point reads for several ids, keyed by id; absent and failed ids are
    /// skipped.
    pub fn get_many(&self, ids: &[&str]) -> BTreeMap<String, Record> {
        ids.iter()
            .filter_map(|id| self.get(id).map(|record| (id.to_string(), record)))
            .collect()
    }

    /// Whether a record exists under `id`. Propagates backend failure.
    pub fn has(&self, id: &str) -> RepositoryResult<bool> {
        if self.cache.get(id).is_some() {
            return Ok(true);
        }
        Ok(self.backend.exists(id)?)
    }

    /// Total record count. Propagates backend failure.
    pub fn count(&self) -> RepositoryResult<u64> {
        Ok(self.backend.count(None)?)
    }

    /// Count of records matching the filter. Propagates backend failure.
    pub fn count_matching(&self, filter: &Filter) -> RepositoryResult<u64> {
        Ok(self.backend.count(Some(filter))?)
    }

    /// Run a structured query. Backend failure degrades to an empty
    /// zero-page result.
    pub fn query(&self, query: &Query) -> QueryResult {
        match self.backend.query(query) {
            Ok(result) => result,
            Err(e) => {
                self.note_read_failure("query", &e);
                QueryResult::empty()
            }
        }
    }

    /// Run a raw parameterized SELECT. Backend failure degrades to an
    /// empty list.
    pub fn select(&self, sql: &str, params: &[Value]) -> Vec<Record> {
        match self.backend.select_raw(sql, params) {
            Ok(records) => records,
            Err(e) => {
                self.note_read_failure("select", &e);
                Vec::new()
            }
        }
    }

    /// Fetch up to `n` records in engine-random order. Propagates backend
    /// failure.
    pub fn get_randomly(&self, n: u64) -> RepositoryResult<Vec<Record>> {
        Ok(self.backend.random(n)?)
    }

    /// Begin (or join) the calling thread's transaction.
    pub fn begin_transaction(&self) -> BackendResult<Transaction> {
        self.manager.begin_transaction()
    }

    /// Whether the calling thread has an active transaction on this
    /// repository's connection manager.
    pub fn has_transaction_begun(&self) -> bool {
        self.manager.has_transaction_begun()
    }

    /// Write operations gated-off repositories still accept from holders of
    /// a [`PrivilegeToken`].
    pub fn privileged<'a>(&'a self, _token: &PrivilegeToken) -> PrivilegedOps<'a> {
        PrivilegedOps { repository: self }
    }

    fn note_read_failure(&self, op: &str, err: &crate::connection::BackendError) {
        self.read_failures.fetch_add(1, Ordering::SeqCst);
        log::warn!(
            "read degraded to empty on repository [{}] op [{}]: {}",
            self.name,
            op,
            err
        );
    }
}

/// Ungated write surface, reachable only through a privilege token.
pub struct PrivilegedOps<'a> {
    repository: &'a Repository,
}

impl PrivilegedOps<'_> {
    /// Insert regardless of the write gate.
    pub fn add(&self, record: Record) -> RepositoryResult<String> {
        self.repository.do_add(record)
    }

    /// Update regardless of the write gate.
    pub fn update(&self, id: &str, record: Record) -> RepositoryResult<()> {
        self.repository.do_update(id, record)
    }

    /// Delete regardless of the write gate.
    pub fn remove(&self, id: &str) -> RepositoryResult<()> {
        self.repository.do_remove(id)
    }
}
