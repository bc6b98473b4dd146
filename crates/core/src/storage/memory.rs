use crate::storage::{Document, DocumentStore};
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Process-local document store. Used when no database is configured and in tests.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    docs: RwLock<BTreeMap<(String, String), Document>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self, collection: &str) -> usize {
        self.docs
            .read()
            .await
            .keys()
            .filter(|(c, _)| c == collection)
            .count()
    }

    pub async fn list(&self, collection: &str) -> Vec<Document> {
        self.docs
            .read()
            .await
            .iter()
            .filter(|((c, _), _)| c == collection)
            .map(|(_, doc)| doc.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> anyhow::Result<Option<Document>> {
        let docs = self.docs.read().await;
        Ok(docs
            .get(&(collection.to_string(), id.to_string()))
            .cloned())
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> anyhow::Result<Document> {
        let doc = Document {
            id: id.to_string(),
            data,
            created_at: Utc::now(),
        };
        self.docs
            .write()
            .await
            .insert((collection.to_string(), id.to_string()), doc.clone());
        Ok(doc)
    }

    async fn add(&self, collection: &str, data: Value) -> anyhow::Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        self.set(collection, &id, data).await?;
        Ok(id)
    }
}
