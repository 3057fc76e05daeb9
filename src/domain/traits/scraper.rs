use async_trait::async_trait;

use crate::application::errors::ScrapeError;
use crate::domain::entities::{NormalizedQuery, RawPriceToken};

/// SourceScraper trait - one external price source
///
/// Implementations fetch a search page (or API) for the query and return the
/// price-like strings found on it. The aggregator enforces the timeout and
/// turns any error into an empty contribution.
#[async_trait]
pub trait SourceScraper: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    async fn fetch(&self, query: &NormalizedQuery) -> Result<Vec<RawPriceToken>, ScrapeError>;
}
