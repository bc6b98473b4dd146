use crate::domain::analysis::{AnalysisOutcome, AnalysisRecord, ExplanationInput};
use crate::error::AnalysisError;
use crate::ingest::AlternativeDataSource;
use crate::llm::prompts::{ExplanationPrompt, RiskLevelPrompt};
use crate::llm::{self, LlmClient};
use crate::storage::reference::{ADANI_POWER_ID, ADANI_POWER_NAME};
use crate::storage::results::ResultStore;
use std::sync::Arc;

/// Runs one analysis end to end: entity lookup, signals, risk prompt, explanation prompt,
/// result record. Every run that gets past the authentication check leaves exactly one
/// record behind unless the failure record itself cannot be written.
#[derive(Clone)]
pub struct AnalysisPipeline {
    store: ResultStore,
    llm: Arc<dyn LlmClient>,
    source: Arc<dyn AlternativeDataSource>,
    entity_id: String,
}

impl AnalysisPipeline {
    pub fn new(
        store: ResultStore,
        llm: Arc<dyn LlmClient>,
        source: Arc<dyn AlternativeDataSource>,
    ) -> Self {
        Self {
            store,
            llm,
            source,
            entity_id: ADANI_POWER_ID.to_string(),
        }
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub async fn run_analysis(&self, user_id: &str) -> AnalysisOutcome {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            tracing::warn!("analysis requested without a user id");
            return AnalysisOutcome::failed(None, AnalysisError::AuthenticationRequired.to_string());
        }

        tracing::info!(user_id, entity_id = %self.entity_id, "starting analysis");

        let mut entity_name: Option<String> = None;
        match self.execute(user_id, &mut entity_name).await {
            Ok(analysis_id) => {
                tracing::info!(user_id, %analysis_id, "analysis complete");
                AnalysisOutcome::completed(analysis_id)
            }
            Err(err) => {
                self.record_failure(user_id, entity_name.as_deref(), err)
                    .await
            }
        }
    }

    async fn execute(
        &self,
        user_id: &str,
        entity_name: &mut Option<String>,
    ) -> Result<String, AnalysisError> {
        let entity = self
            .store
            .get_entity(&self.entity_id)
            .await
            .map_err(AnalysisError::Transport)?
            .ok_or_else(|| AnalysisError::EntityNotFound(self.entity_id.clone()))?;
        *entity_name = Some(entity.name.clone());

        let signals = self
            .source
            .fetch_signals(&entity)
            .await
            .map_err(AnalysisError::Transport)?;
        tracing::debug!(
            entity_id = %entity.id,
            source = self.source.source_name(),
            ?signals,
            "alternative data ready"
        );

        tracing::info!(entity_id = %entity.id, "generating risk level");
        let risk = llm::invoke(self.llm.as_ref(), &RiskLevelPrompt::new(&entity.name), &signals).await?;

        tracing::info!(entity_id = %entity.id, risk_level = %risk.risk_level, "generating explanation");
        let explanation = llm::invoke(
            self.llm.as_ref(),
            &ExplanationPrompt::new(&entity.name),
            &ExplanationInput::from(&risk),
        )
        .await?;

        let record = AnalysisRecord::completed(user_id, &entity.name, risk, explanation);
        self.store
            .create_result(&record)
            .await
            .map_err(AnalysisError::Transport)
    }

    async fn record_failure(
        &self,
        user_id: &str,
        entity_name: Option<&str>,
        err: AnalysisError,
    ) -> AnalysisOutcome {
        let message = err.to_string();
        if let AnalysisError::InvalidResponse(diag) = &err {
            tracing::warn!(prompt = diag.prompt, stage = diag.stage, raw = ?diag.raw_output, "model output rejected");
        }
        let err = anyhow::Error::new(err);
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(user_id, error = %err, "analysis pipeline failed");

        let record =
            AnalysisRecord::failed(user_id, entity_name.unwrap_or(ADANI_POWER_NAME), &message);
        match self.store.create_result(&record).await {
            Ok(analysis_id) => {
                tracing::info!(user_id, %analysis_id, "persisted failure record");
                AnalysisOutcome::failed(Some(analysis_id), message)
            }
            Err(save_err) => {
                let save_err = AnalysisError::PersistenceFailure(save_err);
                tracing::error!(user_id, error = ?save_err, "failed to save failure record");
                AnalysisOutcome::failed(None, save_err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::AnalysisStatus;
    use crate::ingest::mock::MockAlternativeData;
    use crate::llm::error::LlmError;
    use crate::llm::testing::{FixedLlm, ScriptedLlm};
    use crate::storage::memory::MemoryDocumentStore;
    use crate::storage::reference::seed_reference_data;
    use crate::storage::testing::FaultyStore;
    use crate::storage::{DocumentStore, ANALYSIS_RESULTS};
    use serde_json::json;

    async fn seeded_memory() -> (Arc<MemoryDocumentStore>, ResultStore) {
        let docs = Arc::new(MemoryDocumentStore::new());
        let store = ResultStore::new(docs.clone());
        seed_reference_data(&store).await.unwrap();
        (docs, store)
    }

    fn pipeline(store: ResultStore, llm: Arc<dyn LlmClient>) -> AnalysisPipeline {
        AnalysisPipeline::new(store, llm, Arc::new(MockAlternativeData))
    }

    fn risk_answer() -> serde_json::Value {
        json!({
            "riskLevel": "High",
            "confidenceScore": 0.82,
            "keyDrivers": ["ESG", "Market"],
            "explanation": "Coal exposure and weak sentiment.",
        })
    }

    #[tokio::test]
    async fn completed_run_persists_one_record() {
        let (docs, store) = seeded_memory().await;
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(risk_answer()),
            Ok(json!({"aggregatedReasons": "Environmental and regulatory pressure."})),
        ]));
        let outcome = pipeline(store.clone(), llm.clone()).run_analysis("user-1").await;

        assert!(outcome.success, "{outcome:?}");
        assert_eq!(docs.len(ANALYSIS_RESULTS).await, 1);

        let id = outcome.analysis_id.unwrap();
        let result = store.get_result(&id).await.unwrap().unwrap();
        assert_eq!(result.record.status, AnalysisStatus::Completed);
        assert_eq!(result.record.user_id, "user-1");
        assert_eq!(result.record.entity, "Adani Power");
        assert_eq!(result.record.risk_level.as_deref(), Some("High"));
        assert_eq!(result.record.confidence_score, Some(0.82));
        assert_eq!(result.record.key_drivers, vec!["ESG", "Market"]);
        assert_eq!(
            result.record.aggregated_reasons.as_deref(),
            Some("Environmental and regulatory pressure.")
        );

        let requests = llm.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].name, "generateRiskLevel");
        assert!(requests[0].prompt.contains("Innovation Index: 70"));
        assert_eq!(requests[1].name, "explainableAIAnalysis");
        assert!(requests[1].prompt.contains("Risk Level: High"));
        assert!(requests[1].prompt.contains("Key Drivers: ESG, Market"));
    }

    #[tokio::test]
    async fn repeated_runs_are_deterministic_and_not_deduplicated() {
        let (docs, store) = seeded_memory().await;
        let p = pipeline(store.clone(), Arc::new(FixedLlm));

        let a = p.run_analysis("user-1").await.analysis_id.unwrap();
        let b = p.run_analysis("user-1").await.analysis_id.unwrap();
        assert_ne!(a, b);
        assert_eq!(docs.len(ANALYSIS_RESULTS).await, 2);

        let a = store.get_result(&a).await.unwrap().unwrap();
        let b = store.get_result(&b).await.unwrap().unwrap();
        assert_eq!(a.record, b.record);
    }

    #[tokio::test]
    async fn missing_user_id_fails_before_touching_anything() {
        let (docs, store) = seeded_memory().await;
        let llm = Arc::new(ScriptedLlm::default());
        let p = pipeline(store, llm.clone());

        for user_id in ["", "   "] {
            let outcome = p.run_analysis(user_id).await;
            assert!(!outcome.success);
            assert_eq!(outcome.analysis_id, None);
            assert_eq!(outcome.error.as_deref(), Some("User is not authenticated."));
        }
        assert_eq!(docs.len(ANALYSIS_RESULTS).await, 0);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn missing_entity_records_failure_without_model_calls() {
        let docs = Arc::new(MemoryDocumentStore::new());
        let store = ResultStore::new(docs.clone());
        let llm = Arc::new(ScriptedLlm::default());

        let outcome = pipeline(store.clone(), llm.clone()).run_analysis("user-1").await;
        assert!(!outcome.success);
        assert_eq!(
            outcome.error.as_deref(),
            Some("Target entity 'adani_power' not found in database.")
        );
        assert_eq!(llm.calls(), 0);

        let failed = store
            .get_result(&outcome.analysis_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(failed.record.status, AnalysisStatus::Failed);
        assert_eq!(failed.record.entity, "Adani Power");
        assert_eq!(docs.len(ANALYSIS_RESULTS).await, 1);
    }

    #[tokio::test]
    async fn explanation_transport_error_becomes_failed_record() {
        let (docs, store) = seeded_memory().await;
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(risk_answer()),
            Err(LlmError::Transport(anyhow::anyhow!("upstream 503"))),
        ]));

        let outcome = pipeline(store.clone(), llm.clone()).run_analysis("user-1").await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("upstream 503"));
        assert_eq!(llm.calls(), 2);
        assert_eq!(docs.len(ANALYSIS_RESULTS).await, 1);

        let failed = store
            .get_result(&outcome.analysis_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(failed.record.status, AnalysisStatus::Failed);
        assert_eq!(failed.record.error.as_deref(), Some("upstream 503"));
        assert_eq!(failed.record.risk_level, None);
    }

    #[tokio::test]
    async fn invalid_risk_answer_stops_before_explanation() {
        let (docs, store) = seeded_memory().await;
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(json!({"riskLevel": 3}))]));

        let outcome = pipeline(store, llm.clone()).run_analysis("user-1").await;
        assert!(!outcome.success);
        assert!(outcome.analysis_id.is_some());
        assert!(outcome
            .error
            .unwrap()
            .starts_with("invalid model response"));
        assert_eq!(llm.calls(), 1);
        assert_eq!(docs.len(ANALYSIS_RESULTS).await, 1);
    }

    #[tokio::test]
    async fn store_read_error_is_recorded_as_failure() {
        let docs = Arc::new(FaultyStore {
            fail_get: true,
            ..Default::default()
        });
        let store = ResultStore::new(docs.clone());
        let llm = Arc::new(ScriptedLlm::default());

        let outcome = pipeline(store, llm.clone()).run_analysis("user-1").await;
        assert!(!outcome.success);
        assert!(outcome.analysis_id.is_some());
        assert!(outcome.error.unwrap().contains("store unavailable"));
        assert_eq!(llm.calls(), 0);
        assert_eq!(docs.inner.len(ANALYSIS_RESULTS).await, 1);
    }

    #[tokio::test]
    async fn unsaved_failure_returns_generic_error_without_id() {
        let docs = Arc::new(FaultyStore {
            adds_allowed: Some(0),
            ..Default::default()
        });
        let store = ResultStore::new(docs.clone());
        seed_reference_data(&store).await.unwrap();

        let outcome = pipeline(store, Arc::new(FixedLlm)).run_analysis("user-1").await;
        assert_eq!(
            outcome,
            AnalysisOutcome::failed(None, "Analysis failed and could not save a failure record.")
        );
        // Completed write and failure write were both attempted.
        assert_eq!(
            docs.add_attempts.load(std::sync::atomic::Ordering::SeqCst),
            2
        );
        assert_eq!(docs.inner.len(ANALYSIS_RESULTS).await, 0);
        assert!(docs.get("entities", "adani_power").await.unwrap().is_some());
    }
}
