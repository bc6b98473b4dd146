pub mod memory;
pub mod postgres;
pub mod reference;
pub mod results;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde_json::Value;

pub const ENTITIES: &str = "entities";
pub const USERS: &str = "users";
pub const ANALYSIS_RESULTS: &str = "analysis_results";

/// Path of the auxiliary signal collection nested under one entity.
pub fn alternative_data_collection(entity_id: &str) -> String {
    format!("{ENTITIES}/{entity_id}/alternative_data")
}

/// A stored document with its store-assigned timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

/// Single-document point operations against a schemaless collection store.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> anyhow::Result<Option<Document>>;

    /// Creates or replaces the document; the store stamps it with server time.
    async fn set(&self, collection: &str, id: &str, data: Value) -> anyhow::Result<Document>;

    /// Creates a document under a generated identifier and returns that identifier.
    async fn add(&self, collection: &str, data: Value) -> anyhow::Result<String>;
}

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}
