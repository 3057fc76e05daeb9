//! Search-page price sources
//!
//! Every marketplace is the same shape: a search URL, an optional CSS
//! selector for price elements, and an optional proxy fallback for sites
//! that block datacenter traffic.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use scraper::{Html, Selector};
use std::sync::Arc;

use crate::application::errors::{BotError, ConfigError, ScrapeError};
use crate::domain::entities::{NormalizedQuery, RawPriceToken};
use crate::domain::traits::{ProxyPool, SourceScraper};
use crate::infrastructure::config::{Config, SourceConfig, QUERY_PLACEHOLDER};
use crate::infrastructure::webcrawler::{page_text, FetchedPage, WebCrawler};

/// `Rp 1.500.000`, `Rp.250.000`, `rp15000000` in free page text
static RUPIAH_AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)rp\.?[\s\x{00A0}]*\d[\d.,]*").expect("rupiah pattern is valid")
});

pub struct SearchPageScraper {
    config: SourceConfig,
    selector: Option<Selector>,
    crawler: Arc<WebCrawler>,
    proxies: Option<Arc<dyn ProxyPool>>,
    max_proxy_attempts: u32,
}

impl SearchPageScraper {
    pub fn new(config: SourceConfig, crawler: Arc<WebCrawler>) -> Result<Self, ConfigError> {
        let selector = match config.price_selector.as_deref() {
            Some(css) => Some(Selector::parse(css).map_err(|e| {
                ConfigError::InvalidValue(format!("price-selector of '{}' ({}): {}", config.name, css, e))
            })?),
            None => None,
        };

        Ok(Self {
            config,
            selector,
            crawler,
            proxies: None,
            max_proxy_attempts: 0,
        })
    }

    /// Retry through `pool` up to `max_attempts` times when the direct fetch fails
    pub fn with_proxies(mut self, pool: Arc<dyn ProxyPool>, max_attempts: u32) -> Self {
        self.proxies = Some(pool);
        self.max_proxy_attempts = max_attempts;
        self
    }

    pub fn search_url(&self, query: &NormalizedQuery) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_str().as_bytes()).collect();
        self.config
            .search_url
            .replace(QUERY_PLACEHOLDER, &encoded.replace('+', "%20"))
    }

    fn is_challenge(&self, page: &FetchedPage) -> bool {
        if self.config.challenge_markers.is_empty() {
            return false;
        }

        let url = page.url.to_lowercase();
        let title = page.title().unwrap_or_default().to_lowercase();
        self.config.challenge_markers.iter().any(|marker| {
            let marker = marker.to_lowercase();
            url.contains(&marker) || title.contains(&marker)
        })
    }

    /// Price-like substrings of a page
    pub fn extract_tokens(&self, html: &str) -> Vec<RawPriceToken> {
        match &self.selector {
            Some(selector) => {
                let document = Html::parse_document(html);
                let prefix = self.config.price_prefix.as_deref().unwrap_or("");
                document
                    .select(selector)
                    .map(|element| element.text().collect::<String>())
                    .map(|text| text.trim().to_string())
                    .filter(|text| !text.is_empty())
                    .map(|text| {
                        if prefix.is_empty() || text.to_lowercase().starts_with(&prefix.to_lowercase()) {
                            text
                        } else {
                            format!("{} {}", prefix, text)
                        }
                    })
                    .collect()
            }
            None => RUPIAH_AMOUNT
                .find_iter(&page_text(html))
                .map(|m| m.as_str().trim_end_matches(['.', ',']).to_string())
                .collect(),
        }
    }

    fn tokens_from(&self, page: &FetchedPage) -> Result<Vec<RawPriceToken>, ScrapeError> {
        if self.is_challenge(page) {
            return Err(ScrapeError::Challenge {
                source_name: self.config.name.clone(),
                url: page.url.clone(),
            });
        }
        Ok(self.extract_tokens(&page.body))
    }

    async fn fetch_direct(&self, url: &str) -> Result<Vec<RawPriceToken>, ScrapeError> {
        let page = self.crawler.fetch(url, self.config.referer.as_deref()).await?;
        self.tokens_from(&page)
    }

    async fn fetch_with_proxies(&self, pool: &dyn ProxyPool, url: &str) -> Result<Vec<RawPriceToken>, ScrapeError> {
        let mut attempts = 0;
        while attempts < self.max_proxy_attempts {
            let Some(proxy) = pool.next_proxy() else {
                tracing::warn!("[{}] proxy pool is empty", self.config.name);
                break;
            };
            attempts += 1;

            let result = match self.crawler.fetch_via(url, self.config.referer.as_deref(), &proxy).await {
                Ok(page) => self.tokens_from(&page),
                Err(e) => Err(e),
            };

            match result {
                Ok(tokens) if !tokens.is_empty() => {
                    pool.report(&proxy, true);
                    tracing::info!("[{}] got {} token(s) via proxy {}", self.config.name, tokens.len(), proxy);
                    return Ok(tokens);
                }
                Ok(_) => {
                    // reachable but nothing usable, likely a stripped page
                    pool.report(&proxy, false);
                    tracing::debug!("[{}] attempt {} via {} returned no prices", self.config.name, attempts, proxy);
                }
                Err(e) => {
                    pool.report(&proxy, false);
                    tracing::debug!("[{}] attempt {} via {} failed: {}", self.config.name, attempts, proxy, e);
                }
            }
        }

        Err(ScrapeError::ProxyExhausted {
            source_name: self.config.name.clone(),
            attempts,
        })
    }
}

#[async_trait]
impl SourceScraper for SearchPageScraper {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn fetch(&self, query: &NormalizedQuery) -> Result<Vec<RawPriceToken>, ScrapeError> {
        let url = self.search_url(query);
        tracing::debug!("[{}] fetching {}", self.config.name, url);

        let direct = self.fetch_direct(&url).await;
        let found = matches!(&direct, Ok(tokens) if !tokens.is_empty());
        if found || !self.config.use_proxy || self.max_proxy_attempts == 0 {
            return direct;
        }
        let Some(pool) = &self.proxies else {
            return direct;
        };

        match &direct {
            Ok(_) => tracing::info!("[{}] direct fetch found no prices, trying proxies", self.config.name),
            Err(e) => tracing::info!("[{}] direct fetch failed ({}), trying proxies", self.config.name, e),
        }
        self.fetch_with_proxies(pool.as_ref(), &url).await
    }
}

/// One scraper per enabled source
pub fn build_sources(
    sources: &[SourceConfig],
    crawler: Arc<WebCrawler>,
    proxies: Option<Arc<dyn ProxyPool>>,
    max_proxy_attempts: u32,
) -> Result<Vec<Arc<dyn SourceScraper>>, ConfigError> {
    let mut scrapers: Vec<Arc<dyn SourceScraper>> = Vec::new();

    for source in sources.iter().filter(|s| s.enabled) {
        let mut scraper = SearchPageScraper::new(source.clone(), Arc::clone(&crawler))?;
        if source.use_proxy {
            match &proxies {
                Some(pool) => scraper = scraper.with_proxies(Arc::clone(pool), max_proxy_attempts),
                None => tracing::warn!("Source {} wants proxies but none are configured", source.name),
            }
        }
        scrapers.push(Arc::new(scraper));
    }

    tracing::info!("Enabled {} price source(s)", scrapers.len());
    Ok(scrapers)
}

/// Scrapers for the enabled sources of `config`, sharing one crawler bounded by the request timeout
pub fn sources_from_config(
    config: &Config,
    proxies: Option<Arc<dyn ProxyPool>>,
) -> Result<Vec<Arc<dyn SourceScraper>>, BotError> {
    let crawler = Arc::new(WebCrawler::new(
        config.scraping.user_agents.clone(),
        config.request_timeout(),
    )?);
    let scrapers = build_sources(&config.sources, crawler, proxies, config.scraping.max_proxy_attempts)?;
    Ok(scrapers)
}
