use crate::domain::analysis::{AnalysisResult, AnalysisStatus};
use crate::storage::results::ResultStore;
use chrono::SecondsFormat;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("analysis {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AnalysisView {
    Failed(FailureNotice),
    Report(AnalysisReport),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureNotice {
    pub id: String,
    pub title: &'static str,
    pub message: &'static str,
    pub hint: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub id: String,
    pub entity: String,
    pub risk_level: String,
    pub confidence_score: f64,
    /// Confidence on a 0..=100 scale, as drawn on the report gauge.
    pub confidence_percent: f64,
    pub key_drivers: Vec<String>,
    pub explanation: String,
    pub aggregated_reasons: String,
    pub created_at: String,
}

impl From<AnalysisResult> for AnalysisView {
    fn from(result: AnalysisResult) -> Self {
        let AnalysisResult {
            id,
            created_at,
            record,
        } = result;

        if record.status == AnalysisStatus::Failed {
            return Self::Failed(FailureNotice {
                id,
                title: "Analysis Failed",
                message: "We're sorry, but there was an error while processing your analysis request.",
                hint: "Please try again later.",
            });
        }

        let confidence_score = record.confidence_score.unwrap_or_default();
        Self::Report(AnalysisReport {
            id,
            entity: record.entity,
            risk_level: record.risk_level.unwrap_or_default(),
            confidence_score,
            confidence_percent: confidence_score * 100.0,
            key_drivers: record.key_drivers,
            explanation: record.explanation.unwrap_or_default(),
            aggregated_reasons: record.aggregated_reasons.unwrap_or_default(),
            created_at: created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }
}

/// Reads one result record for display. Pure read.
pub async fn load_analysis_view(
    store: &ResultStore,
    analysis_id: &str,
) -> Result<AnalysisView, ViewError> {
    let result = store
        .get_result(analysis_id)
        .await?
        .ok_or_else(|| ViewError::NotFound(analysis_id.to_string()))?;
    Ok(result.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::{AnalysisRecord, ExplanationAggregate, RiskAssessment};
    use crate::storage::memory::MemoryDocumentStore;
    use crate::storage::testing::FaultyStore;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn completed() -> AnalysisRecord {
        AnalysisRecord::completed(
            "user-1",
            "Adani Power",
            RiskAssessment {
                risk_level: "Low".to_string(),
                confidence_score: 0.5,
                key_drivers: vec!["Innovation".to_string()],
                explanation: "Strong pipeline.".to_string(),
            },
            ExplanationAggregate {
                aggregated_reasons: "Innovation offsets ESG.".to_string(),
            },
        )
    }

    #[test]
    fn report_formats_timestamp_and_percent() {
        let view = AnalysisView::from(AnalysisResult {
            id: "r1".to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap(),
            record: completed(),
        });
        let AnalysisView::Report(report) = view else {
            panic!("expected report");
        };
        assert_eq!(report.created_at, "2026-03-01T12:30:00.000Z");
        assert_eq!(report.confidence_percent, 50.0);
        assert_eq!(report.key_drivers, vec!["Innovation"]);
    }

    #[tokio::test]
    async fn failed_record_renders_failure_notice() {
        let store = ResultStore::new(Arc::new(MemoryDocumentStore::new()));
        let id = store
            .create_result(&AnalysisRecord::failed("user-1", "Adani Power", "boom"))
            .await
            .unwrap();

        let view = load_analysis_view(&store, &id).await.unwrap();
        let AnalysisView::Failed(notice) = &view else {
            panic!("expected failure notice, got {view:?}");
        };
        assert_eq!(notice.title, "Analysis Failed");
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["kind"], "failed");
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn completed_record_renders_every_field() {
        let store = ResultStore::new(Arc::new(MemoryDocumentStore::new()));
        let id = store.create_result(&completed()).await.unwrap();

        let view = load_analysis_view(&store, &id).await.unwrap();
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["kind"], "report");
        assert_eq!(json["riskLevel"], "Low");
        assert_eq!(json["aggregatedReasons"], "Innovation offsets ESG.");
        assert_eq!(json["explanation"], "Strong pipeline.");
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let store = ResultStore::new(Arc::new(MemoryDocumentStore::new()));
        let err = load_analysis_view(&store, "nope").await.unwrap_err();
        assert!(matches!(err, ViewError::NotFound(ref id) if id == "nope"));
    }

    #[tokio::test]
    async fn store_failure_is_not_reported_as_missing() {
        let store = ResultStore::new(Arc::new(FaultyStore {
            fail_get: true,
            ..Default::default()
        }));
        let err = load_analysis_view(&store, "any").await.unwrap_err();
        assert!(matches!(err, ViewError::Store(_)));
    }
}
