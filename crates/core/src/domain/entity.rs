use serde::{Deserialize, Serialize};

/// Reference record for the subject of an analysis. Written once when the store is
/// seeded and never touched by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub ticker: String,
    pub country: String,
    pub sector: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Auxiliary signal snapshot stored under `entities/{id}/alternative_data/{source}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeDataSnapshot {
    pub entity: String,
    pub source: String,
    pub tone: String,
    #[serde(default)]
    pub confidence_words: Vec<String>,
    #[serde(default)]
    pub caution_words: Vec<String>,
    pub overall_signal: String,
}
