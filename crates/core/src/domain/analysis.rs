use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric alternative-data signals fed to the risk prompt, each on a 0..=100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlternativeDataInput {
    pub esg_score: f64,
    pub earnings_quality: f64,
    pub market_sentiment: f64,
    pub innovation_index: f64,
}

/// Stage 1 output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub risk_level: String,
    pub confidence_score: f64,
    pub key_drivers: Vec<String>,
    pub explanation: String,
}

/// Stage 2 input: the parts of the risk assessment the explanation pass works from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplanationInput {
    pub risk_level: String,
    pub confidence_score: f64,
    pub key_drivers: Vec<String>,
}

impl From<&RiskAssessment> for ExplanationInput {
    fn from(risk: &RiskAssessment) -> Self {
        Self {
            risk_level: risk.risk_level.clone(),
            confidence_score: risk.confidence_score,
            key_drivers: risk.key_drivers.clone(),
        }
    }
}

/// Stage 2 output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplanationAggregate {
    pub aggregated_reasons: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Fields of an `analysis_results` document as written by the pipeline. The id and
/// `createdAt` are assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub user_id: String,
    pub entity: String,
    pub status: AnalysisStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_drivers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregated_reasons: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisRecord {
    pub fn completed(
        user_id: &str,
        entity: &str,
        risk: RiskAssessment,
        explanation: ExplanationAggregate,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            entity: entity.to_string(),
            status: AnalysisStatus::Completed,
            risk_level: Some(risk.risk_level),
            confidence_score: Some(risk.confidence_score),
            key_drivers: risk.key_drivers,
            explanation: Some(risk.explanation),
            aggregated_reasons: Some(explanation.aggregated_reasons),
            error: None,
        }
    }

    pub fn failed(user_id: &str, entity: &str, error: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            entity: entity.to_string(),
            status: AnalysisStatus::Failed,
            risk_level: None,
            confidence_score: None,
            key_drivers: Vec::new(),
            explanation: None,
            aggregated_reasons: None,
            error: Some(error.to_string()),
        }
    }
}

/// A persisted result record as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: AnalysisRecord,
}

/// Reply of the `runAnalysis` action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisOutcome {
    pub fn completed(analysis_id: String) -> Self {
        Self {
            success: true,
            analysis_id: Some(analysis_id),
            error: None,
        }
    }

    pub fn failed(analysis_id: Option<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            analysis_id,
            error: Some(error.into()),
        }
    }
}
