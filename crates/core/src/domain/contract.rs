use crate::domain::analysis::{ExplanationAggregate, RiskAssessment};
use anyhow::ensure;

impl RiskAssessment {
    /// Normalizes model output and rejects shapes the result record cannot hold.
    pub fn validate(self) -> anyhow::Result<Self> {
        let risk_level = self.risk_level.trim().to_string();
        ensure!(!risk_level.is_empty(), "riskLevel must be non-empty");

        ensure!(
            self.confidence_score.is_finite() && (0.0..=1.0).contains(&self.confidence_score),
            "confidenceScore must be between 0 and 1 (got {})",
            self.confidence_score
        );

        let key_drivers: Vec<String> = self
            .key_drivers
            .into_iter()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();

        let explanation = self.explanation.trim().to_string();
        ensure!(!explanation.is_empty(), "explanation must be non-empty");

        Ok(Self {
            risk_level,
            confidence_score: self.confidence_score,
            key_drivers,
            explanation,
        })
    }
}

impl ExplanationAggregate {
    pub fn validate(self) -> anyhow::Result<Self> {
        let aggregated_reasons = self.aggregated_reasons.trim().to_string();
        ensure!(
            !aggregated_reasons.is_empty(),
            "aggregatedReasons must be non-empty"
        );
        Ok(Self { aggregated_reasons })
    }
}
