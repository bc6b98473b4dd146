use crate::storage::{Document, DocumentStore};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Document collections backed by one JSONB table (see `migrations/`).
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: sqlx::PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> anyhow::Result<Option<Document>> {
        let row = sqlx::query_as::<_, (String, Value, DateTime<Utc>)>(
            "SELECT id, data, created_at FROM documents WHERE collection = $1 AND id = $2",
        )
        .persistent(false)
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("select document {collection}/{id} failed"))?;

        Ok(row.map(|(id, data, created_at)| Document {
            id,
            data,
            created_at,
        }))
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> anyhow::Result<Document> {
        let created_at: DateTime<Utc> = sqlx::query_scalar(
            "INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3) \
             ON CONFLICT (collection, id) DO UPDATE SET data = EXCLUDED.data, created_at = now() \
             RETURNING created_at",
        )
        .persistent(false)
        .bind(collection)
        .bind(id)
        .bind(&data)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("upsert document {collection}/{id} failed"))?;

        Ok(Document {
            id: id.to_string(),
            data,
            created_at,
        })
    }

    async fn add(&self, collection: &str, data: Value) -> anyhow::Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)")
            .persistent(false)
            .bind(collection)
            .bind(&id)
            .bind(&data)
            .execute(&self.pool)
            .await
            .with_context(|| format!("insert document into {collection} failed"))?;
        Ok(id)
    }
}
