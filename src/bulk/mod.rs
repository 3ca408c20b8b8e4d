//! Bulk data interface: credentialed export, import, and administration.
//!
//! The service layer is transport-free; the HTTP routes in [`routes`] are a
//! thin envelope over it. Every call authorizes against the configured
//! remote credentials first, except where the wire contract checks request
//! shape before auth (see the route layer).

use std::sync::Arc;

use subtle::ConstantTimeEq;

use crate::engine::Engine;
use crate::query::{Query, QueryResult};
use crate::record::Record;
use crate::repository::PrivilegeToken;

pub mod errors;
pub mod routes;

pub use errors::BulkError;

/// Credentialed bulk operations over one engine.
pub struct BulkService {
    engine: Arc<Engine>,
}

impl BulkService {
    /// Create the service over an engine.
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    /// The engine this service administers.
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Check credentials against the configured remote user.
    ///
    /// Fails with [`BulkError::Disabled`] when no remote configuration
    /// exists; the comparison itself is constant-time.
    pub fn authorize(&self, user_name: &str, password: &str) -> Result<(), BulkError> {
        let remote = self
            .engine
            .config()
            .remote
            .as_ref()
            .ok_or(BulkError::Disabled)?;

        let user_ok = remote
            .user_name
            .as_bytes()
            .ct_eq(user_name.as_bytes());
        let pass_ok = remote.password.as_bytes().ct_eq(password.as_bytes());
        if bool::from(user_ok & pass_ok) {
            Ok(())
        } else {
            log::warn!("bulk auth failed for user [{}]", user_name);
            Err(BulkError::AuthFailed(user_name.to_string()))
        }
    }

    /// The global writable flag.
    pub fn writable_flag(&self) -> bool {
        self.engine.registry().all_writable()
    }

    /// Set the global writable flag, fanning out to every repository.
    pub fn set_writable_flag(&self, writable: bool) {
        log::info!("bulk interface set writable={}", writable);
        self.engine.registry().set_all_writable(writable);
    }

    /// Names of every registered repository.
    pub fn repository_names(&self) -> Vec<String> {
        self.engine.registry().names()
    }

    /// Fetch one page of a repository's records for export.
    pub fn fetch_page(
        &self,
        repository_name: &str,
        page_num: u64,
        page_size: u64,
    ) -> Result<QueryResult, BulkError> {
        let repository = self
            .engine
            .registry()
            .get(repository_name)
            .ok_or_else(|| BulkError::RepositoryNotFound(repository_name.to_string()))?;

        let query = Query::new().page(page_num).page_size(page_size);
        Ok(repository.query(&query))
    }

    /// Import a JSON array of records into a repository, all or nothing.
    ///
    /// The repository is created on the fly when unregistered; an incoming
    /// name carrying the configured table prefix is stripped first. Returns
    /// the number of records imported.
    pub fn import_batch(&self, repository_name: &str, payload: &str) -> Result<usize, BulkError> {
        let records: Vec<serde_json::Value> = serde_json::from_str(payload)
            .map_err(|e| BulkError::InvalidPayload(e.to_string()))?;

        let name = self
            .engine
            .config()
            .strip_table_prefix(repository_name)
            .to_string();
        let repository = self.engine.repository(&name);

        let tx = repository
            .begin_transaction()
            .map_err(|e| BulkError::Backend(e.to_string()))?;
        let token = PrivilegeToken::new();
        let ops = repository.privileged(&token);

        let mut imported = 0;
        for value in records {
            let record = match Record::from_json(&value) {
                Some(record) => record,
                None => {
                    let _ = tx.rollback();
                    return Err(BulkError::InvalidPayload(
                        "array elements must be objects".to_string(),
                    ));
                }
            };
            if let Err(e) = ops.add(record) {
                let _ = tx.rollback();
                return Err(BulkError::Backend(e.to_string()));
            }
            imported += 1;
        }

        tx.commit().map_err(|e| BulkError::Backend(e.to_string()))?;
        log::info!(
            "bulk imported {} records into repository [{}]",
            imported,
            name
        );
        Ok(imported)
    }

    /// Create the backing table for every registered schema.
    pub fn create_all_tables(&self) -> Result<(), BulkError> {
        self.engine
            .create_all_tables()
            .map_err(|e| BulkError::Backend(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RemoteConfig, RuntimeConfig};
    use crate::record::FieldDefinition;

    fn service() -> BulkService {
        let config = RuntimeConfig::embedded().with_remote(RemoteConfig::new("op", "secret"));
        BulkService::new(Arc::new(Engine::new(config).unwrap()))
    }

    #[test]
    fn test_authorize_accepts_configured_credentials() {
        let service = service();
        assert!(service.authorize("op", "secret").is_ok());
    }

    #[test]
    fn test_authorize_rejects_wrong_password() {
        let service = service();
        assert!(matches!(
            service.authorize("op", "nope"),
            Err(BulkError::AuthFailed(_))
        ));
    }

    #[test]
    fn test_authorize_disabled_without_remote_config() {
        let service = BulkService::new(Arc::new(
            Engine::new(RuntimeConfig::embedded()).unwrap(),
        ));
        assert!(matches!(
            service.authorize("op", "secret"),
            Err(BulkError::Disabled)
        ));
    }

    #[test]
    fn test_fetch_page_unknown_repository() {
        let service = service();
        assert!(matches!(
            service.fetch_page("ghost", 1, 10),
            Err(BulkError::RepositoryNotFound(_))
        ));
    }

    #[test]
    fn test_import_batch_strips_table_prefix() {
        let config = RuntimeConfig::embedded()
            .with_table_prefix("sym")
            .with_remote(RemoteConfig::new("op", "secret"));
        let engine = Arc::new(Engine::new(config).unwrap());
        engine.register_schema("tag", vec![FieldDefinition::string("title", 32)]);
        engine.create_all_tables().unwrap();

        let service = BulkService::new(Arc::clone(&engine));
        let n = service
            .import_batch("sym_tag", r#"[{"title":"rust"},{"title":"db"}]"#)
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(engine.repository("tag").count().unwrap(), 2);
    }

    #[test]
    fn test_import_batch_is_all_or_nothing() {
        let engine = Arc::new(
            Engine::new(
                RuntimeConfig::embedded().with_remote(RemoteConfig::new("op", "secret")),
            )
            .unwrap(),
        );
        engine.register_schema("tag", vec![FieldDefinition::string("title", 32)]);
        engine.create_all_tables().unwrap();
        let service = BulkService::new(Arc::clone(&engine));

        // Second record carries a field outside the registered schema.
        let err = service
            .import_batch("tag", r#"[{"title":"ok"},{"bogus":"x"}]"#)
            .unwrap_err();
        assert!(matches!(err, BulkError::Backend(_)));
        assert_eq!(engine.repository("tag").count().unwrap(), 0);
    }

    #[test]
    fn test_import_into_gated_repository_succeeds() {
        let engine = Arc::new(
            Engine::new(
                RuntimeConfig::embedded().with_remote(RemoteConfig::new("op", "secret")),
            )
            .unwrap(),
        );
        engine.register_schema("tag", vec![FieldDefinition::string("title", 32)]);
        engine.create_all_tables().unwrap();
        engine.registry().set_all_writable(false);

        let service = BulkService::new(Arc::clone(&engine));
        let n = service
            .import_batch("tag", r#"[{"title":"rust"}]"#)
            .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn test_writable_flag_fans_out() {
        let service = service();
        let repository = service.engine().repository("article");
        service.set_writable_flag(false);
        assert!(!service.writable_flag());
        assert!(!repository.is_writable());
        service.set_writable_flag(true);
        assert!(repository.is_writable());
    }
}
