use crate::domain::analysis::{
    AlternativeDataInput, ExplanationAggregate, ExplanationInput, RiskAssessment,
};
use crate::llm::StructuredPrompt;
use serde_json::{json, Value};

/// Stage 1: alternative-data signals to a risk level with confidence and drivers.
#[derive(Debug, Clone)]
pub struct RiskLevelPrompt {
    entity_name: String,
}

impl RiskLevelPrompt {
    pub fn new(entity_name: impl Into<String>) -> Self {
        Self {
            entity_name: entity_name.into(),
        }
    }
}

impl StructuredPrompt for RiskLevelPrompt {
    type Input = AlternativeDataInput;
    type Output = RiskAssessment;

    const NAME: &'static str = "generateRiskLevel";
    const DESCRIPTION: &'static str =
        "Emit the risk level, confidence score, key drivers and explanation as structured JSON";

    fn render(&self, input: &AlternativeDataInput) -> String {
        format!(
            "Analyze the following alternative data for {entity} to determine the risk level, confidence score, and key drivers.\n\n\
ESG Score: {esg}\n\
Earnings Quality: {earnings}\n\
Market Sentiment: {sentiment}\n\
Innovation Index: {innovation}\n\n\
Based on this data, provide a risk level (Low, Medium, High), a confidence score (0-1), the key drivers influencing the risk level, and an explanation of your assessment.\n",
            entity = self.entity_name,
            esg = input.esg_score,
            earnings = input.earnings_quality,
            sentiment = input.market_sentiment,
            innovation = input.innovation_index,
        )
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["riskLevel", "confidenceScore", "keyDrivers", "explanation"],
            "properties": {
                "riskLevel": {
                    "type": "string",
                    "description": format!("The risk level of {} (e.g., Low, Medium, High).", self.entity_name)
                },
                "confidenceScore": {
                    "type": "number",
                    "description": "The confidence score (0-1) of the risk level assessment."
                },
                "keyDrivers": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "The key drivers influencing the risk level (e.g., ESG, Earnings, Market, Innovation)."
                },
                "explanation": {
                    "type": "string",
                    "description": "An explanation of the risk level assessment."
                }
            }
        })
    }

    fn validate(&self, output: RiskAssessment) -> anyhow::Result<RiskAssessment> {
        output.validate()
    }
}

/// Stage 2: aggregates the reasons behind a risk assessment into one explanation.
#[derive(Debug, Clone)]
pub struct ExplanationPrompt {
    entity_name: String,
}

impl ExplanationPrompt {
    pub fn new(entity_name: impl Into<String>) -> Self {
        Self {
            entity_name: entity_name.into(),
        }
    }
}

impl StructuredPrompt for ExplanationPrompt {
    type Input = ExplanationInput;
    type Output = ExplanationAggregate;

    const NAME: &'static str = "explainableAIAnalysis";
    const DESCRIPTION: &'static str =
        "Emit the aggregated reasons behind the analysis as structured JSON";

    fn render(&self, input: &ExplanationInput) -> String {
        format!(
            "Provide an explainable AI analysis for {entity} based on the following information:\n\n\
Risk Level: {level}\n\
Confidence Score: {confidence}\n\
Key Drivers: {drivers}\n\n\
Aggregate the reasons behind the given risk level, confidence score, and key drivers. Provide a comprehensive explanation so that the user can understand the factors influencing the analysis results.",
            entity = self.entity_name,
            level = input.risk_level,
            confidence = input.confidence_score,
            drivers = input.key_drivers.join(", "),
        )
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["aggregatedReasons"],
            "properties": {
                "aggregatedReasons": {
                    "type": "string",
                    "description": "Aggregated reasons behind the risk level, confidence score, and key drivers."
                }
            }
        })
    }

    fn validate(&self, output: ExplanationAggregate) -> anyhow::Result<ExplanationAggregate> {
        output.validate()
    }
}
