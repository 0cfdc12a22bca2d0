use super::{Document, DocumentStore};
use crate::error::{EtlError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

/// A collection persisted as one JSON array at
/// `<root>/<database>/<collection>.json`.
///
/// Every mutation rewrites the whole file through a temporary sibling and a
/// rename, so readers never observe a half-written collection.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(root: impl AsRef<Path>, database: &str, collection: &str) -> Self {
        let path = root
            .as_ref()
            .join(database)
            .join(format!("{}.json", collection));
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Vec<Document>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(Vec::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| EtlError::Store {
                message: format!("corrupt collection file '{}': {}", self.path.display(), e),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, documents: &[Document]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(documents)?;
        fs::write(&tmp, body).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn delete_all(&self) -> Result<u64> {
        let _guard = self.lock.lock().await;
        let existing = self.read_all().await?;
        self.write_all(&[]).await?;
        debug!("Cleared {} document(s) from {}", existing.len(), self.path.display());
        Ok(existing.len() as u64)
    }

    async fn insert_many(&self, documents: Vec<Document>) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let mut existing = self.read_all().await?;
        let inserted = documents.len();
        existing.extend(documents);
        self.write_all(&existing).await?;
        debug!("Appended {} document(s) to {}", inserted, self.path.display());
        Ok(inserted)
    }

    async fn count(&self) -> Result<u64> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    fn doc(v: Value) -> Document {
        v.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_collection_file_layout_and_counts() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path(), "weather", "daily");
        assert_eq!(store.path(), dir.path().join("weather/daily.json"));
        assert_eq!(store.count().await.unwrap(), 0);

        store
            .insert_many(vec![
                doc(json!({"date": "2024-01-01", "humidity": 70})),
                doc(json!({"date": "2024-01-02", "humidity": null})),
            ])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 2);

        let raw: Vec<Value> =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw[1]["humidity"], Value::Null);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_delete_all_reports_removed() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path(), "db", "c");
        store.insert_many(vec![doc(json!({"a": 1}))]).await.unwrap();
        assert_eq!(store.delete_all().await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(store.delete_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_store_error() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path(), "db", "c");
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{not json").unwrap();
        assert!(matches!(store.count().await, Err(EtlError::Store { .. })));
    }
}
