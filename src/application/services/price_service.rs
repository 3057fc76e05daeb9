use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use crate::application::errors::{CacheError, ScrapeError};
use crate::domain::entities::{NormalizedQuery, PriceSet, PriceSummary};
use crate::domain::rules::{OutlierFilter, PriceCleaner, QueryNormalizer};
use crate::domain::traits::{PriceCache, SourceScraper};

pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(12);
pub const DEFAULT_OVERALL_TIMEOUT: Duration = Duration::from_secs(180);

/// Everything the aggregator needs, injected at construction
pub struct AggregatorContext {
    pub normalizer: QueryNormalizer,
    pub cleaner: PriceCleaner,
    pub filter: OutlierFilter,
    pub scrapers: Vec<Arc<dyn SourceScraper>>,
    pub cache: Arc<dyn PriceCache>,
    /// Budget for a single source
    pub source_timeout: Duration,
    /// Budget for the whole lookup, larger than `source_timeout`
    pub overall_timeout: Duration,
}

impl AggregatorContext {
    pub fn new(cache: Arc<dyn PriceCache>) -> Self {
        Self {
            normalizer: QueryNormalizer::default(),
            cleaner: PriceCleaner::default(),
            filter: OutlierFilter::default(),
            scrapers: Vec::new(),
            cache,
            source_timeout: DEFAULT_SOURCE_TIMEOUT,
            overall_timeout: DEFAULT_OVERALL_TIMEOUT,
        }
    }

    pub fn with_scraper(mut self, scraper: Arc<dyn SourceScraper>) -> Self {
        self.scrapers.push(scraper);
        self
    }

    pub fn with_scrapers(mut self, scrapers: impl IntoIterator<Item = Arc<dyn SourceScraper>>) -> Self {
        self.scrapers.extend(scrapers);
        self
    }

    pub fn with_normalizer(mut self, normalizer: QueryNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_cleaner(mut self, cleaner: PriceCleaner) -> Self {
        self.cleaner = cleaner;
        self
    }

    pub fn with_filter(mut self, filter: OutlierFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_timeouts(mut self, source_timeout: Duration, overall_timeout: Duration) -> Self {
        self.source_timeout = source_timeout;
        self.overall_timeout = overall_timeout;
        self
    }
}

/// Terminal states of one price lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceOutcome {
    Found {
        query: NormalizedQuery,
        summary: PriceSummary,
        /// Served from the cache without scraping
        cached: bool,
    },
    /// Every source came back empty
    NotFound { query: NormalizedQuery },
    /// The overall budget ran out; still-running sources were cancelled
    TimedOut { query: NormalizedQuery, after: Duration },
}

impl PriceOutcome {
    pub fn query(&self) -> &NormalizedQuery {
        match self {
            PriceOutcome::Found { query, .. }
            | PriceOutcome::NotFound { query }
            | PriceOutcome::TimedOut { query, .. } => query,
        }
    }

    pub fn summary(&self) -> Option<&PriceSummary> {
        match self {
            PriceOutcome::Found { summary, .. } => Some(summary),
            _ => None,
        }
    }
}

/// Price aggregator - normalize, check cache, fan out, filter, summarize, store
pub struct PriceAggregator {
    ctx: AggregatorContext,
}

impl PriceAggregator {
    pub fn new(ctx: AggregatorContext) -> Self {
        Self { ctx }
    }

    pub fn normalize(&self, question: &str) -> NormalizedQuery {
        self.ctx.normalizer.normalize(question)
    }

    pub fn overall_timeout(&self) -> Duration {
        self.ctx.overall_timeout
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.ctx.scrapers.iter().map(|s| s.name()).collect()
    }

    /// Resolve a free-text price question
    pub async fn resolve(&self, question: &str) -> PriceOutcome {
        let query = self.normalize(question);
        tracing::debug!("Normalized '{}' to '{}'", question, query);

        // Dropping the lookup future on timeout drops every in-flight source future with it
        match tokio::time::timeout(self.ctx.overall_timeout, self.lookup(&query)).await {
            Ok(Some((summary, cached))) => PriceOutcome::Found { query, summary, cached },
            Ok(None) => {
                tracing::info!("No price found for '{}'", query);
                PriceOutcome::NotFound { query }
            }
            Err(_) => {
                tracing::warn!(
                    "Price lookup for '{}' exceeded {:?}, cancelled",
                    query,
                    self.ctx.overall_timeout
                );
                PriceOutcome::TimedOut {
                    query,
                    after: self.ctx.overall_timeout,
                }
            }
        }
    }

    /// Drop the cached entry for a question
    pub async fn forget(&self, question: &str) -> Result<bool, CacheError> {
        let query = self.normalize(question);
        let removed = self.ctx.cache.invalidate(&query).await?;
        tracing::info!("Cache entry for '{}' invalidated: {}", query, removed);
        Ok(removed)
    }

    pub async fn clear_cache(&self) -> Result<usize, CacheError> {
        let removed = self.ctx.cache.clear().await?;
        tracing::info!("Cleared {} cached price(s)", removed);
        Ok(removed)
    }

    async fn lookup(&self, query: &NormalizedQuery) -> Option<(PriceSummary, bool)> {
        if let Some(summary) = self.cached(query).await {
            return Some((summary, true));
        }

        let merged = self.collect(query).await;
        let filtered = self.ctx.filter.filter(&merged);
        if filtered.len() < merged.len() {
            tracing::debug!(
                "Merged filter dropped {} of {} price(s) for '{}'",
                merged.len() - filtered.len(),
                merged.len(),
                query
            );
        }

        let summary = PriceSummary::from_prices(&filtered)?;
        self.store(query, &summary).await;
        Some((summary, false))
    }

    async fn cached(&self, query: &NormalizedQuery) -> Option<PriceSummary> {
        match self.ctx.cache.get(query).await {
            Ok(Some(summary)) => {
                tracing::info!("Cache hit for '{}'", query);
                Some(summary)
            }
            Ok(None) => {
                tracing::info!("Cache miss for '{}'", query);
                None
            }
            Err(e) => {
                tracing::warn!("Cache unavailable, scraping '{}' anyway: {}", query, e);
                None
            }
        }
    }

    async fn store(&self, query: &NormalizedQuery, summary: &PriceSummary) {
        match self.ctx.cache.put(query, summary).await {
            Ok(()) => tracing::info!(
                "Cached '{}': min {} max {} avg {}",
                query,
                summary.min,
                summary.max,
                summary.avg
            ),
            Err(e) => tracing::warn!("Failed to cache '{}': {}", query, e),
        }
    }

    /// Run every source concurrently and union their filtered prices
    async fn collect(&self, query: &NormalizedQuery) -> PriceSet {
        let tasks = self
            .ctx
            .scrapers
            .iter()
            .map(|scraper| self.scrape_source(scraper.as_ref(), query));

        join_all(tasks).await.into_iter().flatten().collect()
    }

    /// Fetch, clean and filter one source. Any failure yields an empty set.
    async fn scrape_source(&self, scraper: &dyn SourceScraper, query: &NormalizedQuery) -> PriceSet {
        let name = scraper.name();
        let result = match tokio::time::timeout(self.ctx.source_timeout, scraper.fetch(query)).await {
            Ok(result) => result,
            Err(_) => Err(ScrapeError::Timeout {
                source_name: name.to_string(),
                after: self.ctx.source_timeout,
            }),
        };

        let tokens = match result {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!("Source {} failed for '{}': {}", name, query, e);
                return PriceSet::new();
            }
        };

        let cleaned = self.ctx.cleaner.clean_all(&tokens);
        let filtered = self.ctx.filter.filter(&cleaned);
        tracing::debug!(
            "Source {}: {} token(s), {} price(s), {} after filtering",
            name,
            tokens.len(),
            cleaned.len(),
            filtered.len()
        );
        filtered
    }
}
