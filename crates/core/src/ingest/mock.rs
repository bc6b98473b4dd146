use crate::domain::analysis::AlternativeDataInput;
use crate::domain::entity::Entity;
use crate::ingest::AlternativeDataSource;

pub const MOCK_SIGNALS: AlternativeDataInput = AlternativeDataInput {
    esg_score: 65.0,
    earnings_quality: 80.0,
    market_sentiment: 45.0,
    innovation_index: 70.0,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct MockAlternativeData;

#[async_trait::async_trait]
impl AlternativeDataSource for MockAlternativeData {
    fn source_name(&self) -> &'static str {
        "mock"
    }

    async fn fetch_signals(&self, entity: &Entity) -> anyhow::Result<AlternativeDataInput> {
        tracing::debug!(entity_id = %entity.id, "using mock alternative data");
        Ok(MOCK_SIGNALS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::reference::adani_power;

    #[tokio::test]
    async fn mock_signals_are_fixed() {
        let source = MockAlternativeData;
        let a = source.fetch_signals(&adani_power()).await.unwrap();
        let b = source.fetch_signals(&adani_power()).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.esg_score, 65.0);
        assert_eq!(a.market_sentiment, 45.0);
    }
}
