use crate::domain::analysis::{AnalysisRecord, AnalysisResult};
use crate::domain::entity::{AlternativeDataSnapshot, Entity};
use crate::domain::user::{UserProfile, UserProfileRecord};
use crate::storage::{
    alternative_data_collection, Document, DocumentStore, ANALYSIS_RESULTS, ENTITIES, USERS,
};
use anyhow::Context;
use std::sync::Arc;

/// Typed access to the collections the pipeline reads and writes.
#[derive(Clone)]
pub struct ResultStore {
    docs: Arc<dyn DocumentStore>,
}

impl ResultStore {
    pub fn new(docs: Arc<dyn DocumentStore>) -> Self {
        Self { docs }
    }

    pub async fn get_entity(&self, entity_id: &str) -> anyhow::Result<Option<Entity>> {
        let Some(doc) = self.docs.get(ENTITIES, entity_id).await? else {
            return Ok(None);
        };
        let entity = serde_json::from_value::<Entity>(doc.data)
            .with_context(|| format!("entity document {entity_id} has an unexpected shape"))?;
        Ok(Some(entity))
    }

    pub async fn put_entity(&self, entity: &Entity) -> anyhow::Result<()> {
        let data = serde_json::to_value(entity).context("entity serialize failed")?;
        self.docs.set(ENTITIES, &entity.id, data).await?;
        Ok(())
    }

    pub async fn put_alternative_data(
        &self,
        entity_id: &str,
        source: &str,
        snapshot: &AlternativeDataSnapshot,
    ) -> anyhow::Result<()> {
        let data = serde_json::to_value(snapshot).context("alternative data serialize failed")?;
        self.docs
            .set(&alternative_data_collection(entity_id), source, data)
            .await?;
        Ok(())
    }

    pub async fn create_result(&self, record: &AnalysisRecord) -> anyhow::Result<String> {
        let data = serde_json::to_value(record).context("analysis record serialize failed")?;
        self.docs.add(ANALYSIS_RESULTS, data).await
    }

    pub async fn get_result(&self, analysis_id: &str) -> anyhow::Result<Option<AnalysisResult>> {
        let Some(Document {
            id,
            data,
            created_at,
        }) = self.docs.get(ANALYSIS_RESULTS, analysis_id).await?
        else {
            return Ok(None);
        };
        let record = serde_json::from_value::<AnalysisRecord>(data)
            .with_context(|| format!("analysis result {analysis_id} has an unexpected shape"))?;
        Ok(Some(AnalysisResult {
            id,
            created_at,
            record,
        }))
    }

    pub async fn get_user(&self, uid: &str) -> anyhow::Result<Option<UserProfile>> {
        let Some(doc) = self.docs.get(USERS, uid).await? else {
            return Ok(None);
        };
        let record = serde_json::from_value::<UserProfileRecord>(doc.data)
            .with_context(|| format!("user profile {uid} has an unexpected shape"))?;
        Ok(Some(UserProfile {
            record,
            created_at: doc.created_at,
        }))
    }

    pub async fn create_user(&self, record: &UserProfileRecord) -> anyhow::Result<UserProfile> {
        let data = serde_json::to_value(record).context("user profile serialize failed")?;
        let doc = self.docs.set(USERS, &record.id, data).await?;
        Ok(UserProfile {
            record: record.clone(),
            created_at: doc.created_at,
        })
    }
}
