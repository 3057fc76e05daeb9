use async_trait::async_trait;

use crate::application::errors::CacheError;
use crate::domain::entities::{NormalizedQuery, PriceSummary};

/// PriceCache trait - normalized query to summary store
///
/// Shared by every in-flight lookup. Writes to the same key are
/// last-write-wins.
#[async_trait]
pub trait PriceCache: Send + Sync {
    /// Fresh entry for the key, `None` on a miss or an expired entry
    async fn get(&self, key: &NormalizedQuery) -> Result<Option<PriceSummary>, CacheError>;

    async fn put(&self, key: &NormalizedQuery, summary: &PriceSummary) -> Result<(), CacheError>;

    /// Returns whether an entry was removed
    async fn invalidate(&self, key: &NormalizedQuery) -> Result<bool, CacheError>;

    /// Returns the number of removed entries
    async fn clear(&self) -> Result<usize, CacheError>;
}
