//! In-process price cache

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::application::errors::CacheError;
use crate::domain::entities::{CachedSummary, NormalizedQuery, PriceSummary};
use crate::domain::traits::PriceCache;

/// HashMap-backed cache, lost on restart
#[derive(Clone)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, CachedSummary>>>,
    ttl: Option<Duration>,
}

impl MemoryCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop every expired entry, returning how many went
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        self.sweep(&mut entries)
    }

    fn sweep(&self, entries: &mut HashMap<String, CachedSummary>) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let now = Utc::now();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(self.ttl, now));
        before - entries.len()
    }
}

#[async_trait]
impl PriceCache for MemoryCache {
    async fn get(&self, key: &NormalizedQuery) -> Result<Option<PriceSummary>, CacheError> {
        {
            let entries = self.entries.read().await;
            match entries.get(key.as_str()) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(self.ttl, Utc::now()) => {
                    return Ok(Some(entry.summary));
                }
                Some(_) => {}
            }
        }

        // Expired: evict under the write lock, re-checking in case of a concurrent put
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(key.as_str()) {
            if entry.is_expired(self.ttl, Utc::now()) {
                tracing::debug!("Evicting expired cache entry '{}'", key);
                entries.remove(key.as_str());
            } else {
                return Ok(Some(entry.summary));
            }
        }
        Ok(None)
    }

    async fn put(&self, key: &NormalizedQuery, summary: &PriceSummary) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        // Keys that are never read again would otherwise stay forever
        let swept = self.sweep(&mut entries);
        if swept > 0 {
            tracing::debug!("Swept {} expired cache entries", swept);
        }
        entries.insert(key.to_string(), CachedSummary::new(*summary));
        Ok(())
    }

    async fn invalidate(&self, key: &NormalizedQuery) -> Result<bool, CacheError> {
        let mut entries = self.entries.write().await;
        Ok(entries.remove(key.as_str()).is_some())
    }

    async fn clear(&self) -> Result<usize, CacheError> {
        let mut entries = self.entries.write().await;
        let removed = entries.len();
        entries.clear();
        Ok(removed)
    }
}
