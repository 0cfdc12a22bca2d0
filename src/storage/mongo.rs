use super::{Document, DocumentStore};
use crate::config::StoreConfig;
use crate::error::{EtlError, Result};
use async_trait::async_trait;
use mongodb::bson::{self, doc};
use mongodb::{Client, Collection};
use tracing::info;

/// MongoDB collection addressed by a `mongodb://` or `mongodb+srv://` URI.
pub struct MongoStore {
    collection: Collection<bson::Document>,
}

impl MongoStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let client = Client::with_uri_str(&config.uri).await?;
        let collection = client
            .database(&config.database)
            .collection::<bson::Document>(&config.collection);
        info!(
            "Connected to MongoDB collection {}.{}",
            config.database, config.collection
        );
        Ok(Self { collection })
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn delete_all(&self) -> Result<u64> {
        let result = self.collection.delete_many(doc! {}, None).await?;
        Ok(result.deleted_count)
    }

    async fn insert_many(&self, documents: Vec<Document>) -> Result<usize> {
        let docs = documents
            .iter()
            .map(|d| {
                bson::to_document(d).map_err(|e| EtlError::Store {
                    message: format!("could not encode document: {}", e),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let result = self.collection.insert_many(docs, None).await?;
        Ok(result.inserted_ids.len())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.collection.count_documents(doc! {}, None).await?)
    }
}
