//! Replace a document-store collection with the rows of the pipeline's
//! output file.

use crate::error::Result;
use crate::pipeline::extract::read_delimited;
use crate::storage::{Document, DocumentStore};
use crate::table::Table;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct LoadSummary {
    pub deleted: u64,
    pub inserted: usize,
}

/// Delete every document in the store, then bulk-insert one document per row.
/// An empty table leaves the collection empty and skips the insert.
pub async fn load_table(store: &dyn DocumentStore, table: &Table) -> Result<LoadSummary> {
    let documents: Vec<Document> = table.to_records();

    let deleted = store.delete_all().await?;
    info!("Removed {} existing document(s)", deleted);

    if documents.is_empty() {
        warn!("No rows to load; collection left empty");
        return Ok(LoadSummary { deleted, inserted: 0 });
    }

    let inserted = store.insert_many(documents).await?;
    info!(outcome = "success", inserted, "Data loaded into document store");
    Ok(LoadSummary { deleted, inserted })
}

/// Read `path` with the delimited reader and load it. An unreadable file fails
/// before the collection is touched.
pub async fn load_file(store: &dyn DocumentStore, path: &Path) -> Result<LoadSummary> {
    let table = read_delimited(path)?;
    info!(rows = table.len(), "Read {}", path.display());
    load_table(store, &table).await
}
