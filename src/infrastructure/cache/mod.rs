//! Price cache backends

pub mod memory;
pub mod sqlite;

pub use memory::MemoryCache;
pub use sqlite::SqliteCache;

use std::sync::Arc;
use std::time::Duration;

use crate::application::errors::CacheError;
use crate::domain::traits::PriceCache;
use crate::infrastructure::config::{CacheBackend, CacheConfig};

/// Build the configured backend
pub fn build_cache(config: &CacheConfig) -> Result<Arc<dyn PriceCache>, CacheError> {
    let ttl = config.ttl_secs.map(Duration::from_secs);

    match config.backend {
        CacheBackend::Memory => {
            tracing::info!("Using in-memory price cache (ttl {:?})", ttl);
            Ok(Arc::new(MemoryCache::new(ttl)))
        }
        CacheBackend::Sqlite => {
            let cache = SqliteCache::open(&config.path, ttl)?;
            match cache.purge_expired() {
                Ok(0) => {}
                Ok(n) => tracing::info!("Purged {} expired cache entries", n),
                Err(e) => tracing::warn!("Failed to purge expired cache entries: {}", e),
            }
            tracing::info!("Using SQLite price cache at {} (ttl {:?})", config.path.display(), ttl);
            Ok(Arc::new(cache))
        }
    }
}
