//! SQLite-backed price cache that survives restarts

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::application::errors::CacheError;
use crate::domain::entities::{CachedSummary, NormalizedQuery, PriceSummary};
use crate::domain::traits::PriceCache;

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        CacheError::Backend(err.to_string())
    }
}

/// Queries run on tokio's blocking pool, one at a time behind the connection lock
pub struct SqliteCache {
    conn: Arc<Mutex<Connection>>,
    ttl: Option<Duration>,
}

impl SqliteCache {
    pub fn open(path: impl AsRef<Path>, ttl: Option<Duration>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn, ttl)
    }

    pub fn in_memory(ttl: Option<Duration>) -> Result<Self, CacheError> {
        Self::with_connection(Connection::open_in_memory()?, ttl)
    }

    fn with_connection(conn: Connection, ttl: Option<Duration>) -> Result<Self, CacheError> {
        let cache = Self {
            conn: Arc::new(Mutex::new(conn)),
            ttl,
        };
        cache.init_tables()?;
        Ok(cache)
    }

    fn init_tables(&self) -> Result<(), CacheError> {
        lock(&self.conn)?.execute(
            "CREATE TABLE IF NOT EXISTS price_cache (
                query TEXT PRIMARY KEY,
                summary TEXT NOT NULL,
                cached_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Drop every expired row, returning how many went. Runs inline, meant for startup.
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        let Some(ttl) = self.ttl else {
            return Ok(0);
        };
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| CacheError::Backend(format!("ttl out of range: {}", e)))?;
        let cutoff = timestamp(Utc::now() - ttl);

        // fixed-width UTC timestamps sort lexicographically
        let removed = lock(&self.conn)?.execute("DELETE FROM price_cache WHERE cached_at <= ?1", params![cutoff])?;
        Ok(removed)
    }

    async fn run<T, F>(&self, op: F) -> Result<T, CacheError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, CacheError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || op(&*lock(&conn)?))
            .await
            .map_err(|e| CacheError::Unavailable(format!("cache task failed: {}", e)))?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, CacheError> {
    conn.lock()
        .map_err(|_| CacheError::Unavailable("cache connection lock poisoned".to_string()))
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
impl PriceCache for SqliteCache {
    async fn get(&self, key: &NormalizedQuery) -> Result<Option<PriceSummary>, CacheError> {
        let key = key.to_string();
        let ttl = self.ttl;

        self.run(move |conn| {
            let row: Option<(String, String)> = conn
                .query_row(
                    "SELECT summary, cached_at FROM price_cache WHERE query = ?1",
                    params![key],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((summary, cached_at)) = row else {
                return Ok(None);
            };

            let cached_at = DateTime::parse_from_rfc3339(&cached_at)
                .map_err(|e| CacheError::Backend(format!("bad timestamp for '{}': {}", key, e)))?
                .with_timezone(&Utc);
            let entry = CachedSummary {
                summary: serde_json::from_str(&summary)?,
                cached_at,
            };

            if entry.is_expired(ttl, Utc::now()) {
                tracing::debug!("Evicting expired cache entry '{}'", key);
                conn.execute("DELETE FROM price_cache WHERE query = ?1", params![key])?;
                return Ok(None);
            }

            Ok(Some(entry.summary))
        })
        .await
    }

    async fn put(&self, key: &NormalizedQuery, summary: &PriceSummary) -> Result<(), CacheError> {
        let key = key.to_string();
        let entry = CachedSummary::new(*summary);
        let json = serde_json::to_string(&entry.summary)?;

        self.run(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO price_cache (query, summary, cached_at) VALUES (?1, ?2, ?3)",
                params![key, json, timestamp(entry.cached_at)],
            )?;
            Ok(())
        })
        .await
    }

    async fn invalidate(&self, key: &NormalizedQuery) -> Result<bool, CacheError> {
        let key = key.to_string();
        self.run(move |conn| {
            let removed = conn.execute("DELETE FROM price_cache WHERE query = ?1", params![key])?;
            Ok(removed > 0)
        })
        .await
    }

    async fn clear(&self) -> Result<usize, CacheError> {
        self.run(|conn| Ok(conn.execute("DELETE FROM price_cache", [])?)).await
    }
}
