//! Repository registry.
//!
//! An explicit registry object owned by the engine and passed by reference
//! to the components that need name-to-instance lookup; nothing here is
//! process-global. Repositories register themselves as they are constructed.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::record::FieldDefinition;

use super::Repository;

/// Name-to-instance mapping plus field metadata and the global writable flag.
pub struct RepositoryRegistry {
    repositories: Mutex<BTreeMap<String, Arc<Repository>>>,
    schemas: Mutex<BTreeMap<String, Arc<Vec<FieldDefinition>>>>,
    all_writable: AtomicBool,
}

impl Default for RepositoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryRegistry {
    /// Create an empty registry; repositories start out writable.
    pub fn new() -> Self {
        Self {
            repositories: Mutex::new(BTreeMap::new()),
            schemas: Mutex::new(BTreeMap::new()),
            all_writable: AtomicBool::new(true),
        }
    }

    /// Register a repository instance under its name.
    pub fn register(&self, repository: Arc<Repository>) {
        log::info!("registered repository [{}]", repository.name());
        self.repositories
            .lock()
            .expect("registry lock poisoned")
            .insert(repository.name().to_string(), repository);
    }

    /// Resolve a repository by name.
    pub fn get(&self, name: &str) -> Option<Arc<Repository>> {
        self.repositories
            .lock()
            .expect("registry lock poisoned")
            .get(name)
            .cloned()
    }

    /// All registered repository names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.repositories
            .lock()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Record the field definitions for a repository name.
    pub fn set_schema(&self, name: impl Into<String>, fields: Vec<FieldDefinition>) {
        self.schemas
            .lock()
            .expect("registry lock poisoned")
            .insert(name.into(), Arc::new(fields));
    }

    /// Field definitions for a repository name, if registered.
    pub fn schema(&self, name: &str) -> Option<Arc<Vec<FieldDefinition>>> {
        self.schemas
            .lock()
            .expect("registry lock poisoned")
            .get(name)
            .cloned()
    }

    /// Every registered schema, by repository name.
    pub fn schemas(&self) -> Vec<(String, Arc<Vec<FieldDefinition>>)> {
        self.schemas
            .lock()
            .expect("registry lock poisoned")
            .iter()
            .map(|(name, fields)| (name.clone(), Arc::clone(fields)))
            .collect()
    }

    /// The global writable flag consulted by the remote interface.
    pub fn all_writable(&self) -> bool {
        self.all_writable.load(Ordering::SeqCst)
    }

    /// Set the global writable flag and fan it out to every registered
    /// repository.
    pub fn set_all_writable(&self, writable: bool) {
        self.all_writable.store(writable, Ordering::SeqCst);
        let repositories = self.repositories.lock().expect("registry lock poisoned");
        for repository in repositories.values() {
            repository.set_writable(writable);
        }
    }
}
