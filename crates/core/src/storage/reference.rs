use crate::domain::entity::{AlternativeDataSnapshot, Entity};
use crate::storage::results::ResultStore;

pub const ADANI_POWER_ID: &str = "adani_power";
pub const ADANI_POWER_NAME: &str = "Adani Power";

pub fn adani_power() -> Entity {
    Entity {
        id: ADANI_POWER_ID.to_string(),
        name: ADANI_POWER_NAME.to_string(),
        ticker: "ADANIPOWER".to_string(),
        country: "India".to_string(),
        sector: "Power Generation".to_string(),
        keywords: [
            "Adani Power",
            "thermal power",
            "coal plant",
            "environment",
            "regulatory",
            "earnings",
        ]
        .into_iter()
        .map(String::from)
        .collect(),
    }
}

fn earnings_snapshot() -> AlternativeDataSnapshot {
    AlternativeDataSnapshot {
        entity: ADANI_POWER_NAME.to_string(),
        source: "Public earnings summaries".to_string(),
        tone: "Cautious".to_string(),
        confidence_words: vec!["growth".to_string(), "capacity expansion".to_string()],
        caution_words: vec!["regulatory".to_string(), "cost pressure".to_string()],
        overall_signal: "Mildly Negative".to_string(),
    }
}

/// Writes the reference entity and its earnings snapshot. Safe to repeat.
pub async fn seed_reference_data(store: &ResultStore) -> anyhow::Result<()> {
    store.put_entity(&adani_power()).await?;
    store
        .put_alternative_data(ADANI_POWER_ID, "earnings_data", &earnings_snapshot())
        .await?;
    tracing::info!(entity_id = ADANI_POWER_ID, "seeded reference data");
    Ok(())
}
