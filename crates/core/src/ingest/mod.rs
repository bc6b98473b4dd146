pub mod mock;

use crate::domain::analysis::AlternativeDataInput;
use crate::domain::entity::Entity;

/// Produces the alternative-data signals for one entity. The only implementation today
/// is a fixed mock; live ingestion plugs in here.
#[async_trait::async_trait]
pub trait AlternativeDataSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch_signals(&self, entity: &Entity) -> anyhow::Result<AlternativeDataInput>;
}
