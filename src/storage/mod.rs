pub mod json_file;
#[cfg(feature = "mongo")]
pub mod mongo;

use crate::config::StoreConfig;
use crate::error::{EtlError, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::debug;

pub use json_file::JsonFileStore;
#[cfg(feature = "mongo")]
pub use mongo::MongoStore;

/// A self-describing record: column name to value, nulls preserved.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// A single remote collection the loader replaces wholesale.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Delete every document in the collection; returns how many were removed.
    async fn delete_all(&self) -> Result<u64>;
    /// Insert all documents as one bulk operation; returns how many were inserted.
    async fn insert_many(&self, documents: Vec<Document>) -> Result<usize>;
    async fn count(&self) -> Result<u64>;
}

/// Pick a backend from the URI scheme.
///
/// - `mongodb://`, `mongodb+srv://` → MongoDB (needs the `mongo` feature)
/// - `file://<dir>` → JSON files under `<dir>/<database>/<collection>.json`
/// - `memory://` → process-local store
pub async fn open_store(config: &StoreConfig) -> Result<Box<dyn DocumentStore>> {
    let uri = config.uri.trim();
    if uri.starts_with("mongodb://") || uri.starts_with("mongodb+srv://") {
        open_mongo(config).await
    } else if let Some(root) = uri.strip_prefix("file://") {
        Ok(Box::new(JsonFileStore::new(root, &config.database, &config.collection)))
    } else if uri.starts_with("memory://") {
        Ok(Box::new(InMemoryStore::new()))
    } else {
        Err(EtlError::Config(format!("unsupported store URI scheme: '{}'", uri)))
    }
}

#[cfg(feature = "mongo")]
async fn open_mongo(config: &StoreConfig) -> Result<Box<dyn DocumentStore>> {
    Ok(Box::new(MongoStore::connect(config).await?))
}

#[cfg(not(feature = "mongo"))]
async fn open_mongo(_config: &StoreConfig) -> Result<Box<dyn DocumentStore>> {
    Err(EtlError::Config(
        "MongoDB URIs require building with `--features mongo`".to_string(),
    ))
}

/// In-memory store for development/testing
#[derive(Clone, Default)]
pub struct InMemoryStore {
    documents: Arc<Mutex<Vec<Document>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Document> {
        self.documents
            .lock()
            .map(|docs| docs.clone())
            .unwrap_or_default()
    }
}

fn poisoned<T>(_: T) -> EtlError {
    EtlError::Store {
        message: "in-memory store lock poisoned".to_string(),
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn delete_all(&self) -> Result<u64> {
        let mut docs = self.documents.lock().map_err(poisoned)?;
        let removed = docs.len() as u64;
        docs.clear();
        debug!("Deleted {} in-memory documents", removed);
        Ok(removed)
    }

    async fn insert_many(&self, documents: Vec<Document>) -> Result<usize> {
        let mut docs = self.documents.lock().map_err(poisoned)?;
        let inserted = documents.len();
        docs.extend(documents);
        debug!("Inserted {} in-memory documents", inserted);
        Ok(inserted)
    }

    async fn count(&self) -> Result<u64> {
        let docs = self.documents.lock().map_err(poisoned)?;
        Ok(docs.len() as u64)
    }
}
