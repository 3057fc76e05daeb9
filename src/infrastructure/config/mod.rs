//! Configuration management

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use crate::application::errors::ConfigError;
use crate::application::services::chat_service::DEFAULT_PRICE_KEYWORDS;
use crate::domain::rules::clean::{DEFAULT_MAX_PRICE, DEFAULT_MIN_PRICE};
use crate::domain::rules::normalize::{DEFAULT_CORRECTIONS, DEFAULT_FILLER_PHRASES};
use crate::domain::rules::outlier::DEFAULT_FENCE;
use crate::domain::rules::{OutlierFilter, PriceCleaner, QueryNormalizer};

/// Placeholder replaced by the encoded query in `search-url`
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// Bot configuration. Missing top-level sections take their defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub bot: BotConfig,
    pub normalizer: NormalizerConfig,
    pub cleaner: CleanerConfig,
    pub scraping: ScrapingConfig,
    pub sources: Vec<SourceConfig>,
    pub cache: CacheConfig,
    pub proxy: ProxyConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BotConfig {
    pub name: String,
    pub price_keywords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct NormalizerConfig {
    pub filler_phrases: Vec<String>,
    pub corrections: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CleanerConfig {
    pub min_price: u64,
    pub max_price: u64,
    /// Tukey fence multiplier for outlier rejection
    pub iqr_fence: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScrapingConfig {
    pub source_timeout_secs: u64,
    /// Budget for one HTTP request; the direct fetch and every proxy retry must fit in a source budget
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    pub overall_timeout_secs: u64,
    pub max_proxy_attempts: u32,
    pub user_agents: Vec<String>,
}

/// One search-page price source
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceConfig {
    pub name: String,
    /// Search URL with a `{query}` placeholder
    pub search_url: String,
    #[serde(default)]
    pub referer: Option<String>,
    /// CSS selector for price elements; without it the page text is scanned for `Rp` amounts
    #[serde(default)]
    pub price_selector: Option<String>,
    /// Prepended to selector text, e.g. `Rp` when the element holds only digits
    #[serde(default)]
    pub price_prefix: Option<String>,
    /// Substrings of the final URL or page title that mark an anti-bot page
    #[serde(default)]
    pub challenge_markers: Vec<String>,
    /// Retry through the proxy pool when the direct fetch fails
    #[serde(default)]
    pub use_proxy: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub path: PathBuf,
    /// Entries older than this are ignored and removed; `None` keeps them forever
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProxyConfig {
    pub addresses: Vec<String>,
    /// File with one `host:port` per line
    pub list_path: Option<PathBuf>,
    /// Consecutive failures before an address is dropped
    pub max_failures: u32,
}

fn default_true() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    2
}

fn default_user_agents() -> Vec<String> {
    [
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    ]
    .iter()
    .map(|ua| ua.to_string())
    .collect()
}

fn default_sources() -> Vec<SourceConfig> {
    let source = |name: &str, search_url: &str, referer: &str| SourceConfig {
        name: name.to_string(),
        search_url: search_url.to_string(),
        referer: Some(referer.to_string()),
        price_selector: None,
        price_prefix: None,
        challenge_markers: vec!["challenge".to_string(), "captcha".to_string()],
        use_proxy: false,
        enabled: true,
    };

    vec![
        source(
            "tokopedia",
            "https://www.tokopedia.com/search?st=product&q={query}",
            "https://www.tokopedia.com/",
        ),
        source(
            "priceza",
            "https://www.priceza.co.id/s/priceza-search/?search={query}",
            "https://www.priceza.co.id/",
        ),
        source(
            "bukalapak",
            "https://www.bukalapak.com/products?search%5Bkeywords%5D={query}",
            "https://www.bukalapak.com/",
        ),
        SourceConfig {
            price_selector: Some(".blu-product-card__price-final".to_string()),
            price_prefix: Some("Rp".to_string()),
            use_proxy: true,
            ..source("blibli", "https://www.blibli.com/cari/{query}", "https://www.blibli.com/")
        },
        SourceConfig {
            price_selector: Some("span.money".to_string()),
            ..source(
                "digimap",
                "https://www.digimap.co.id/search?type=product&q={query}",
                "https://www.digimap.co.id/",
            )
        },
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot: BotConfig {
                name: "harga-bot".to_string(),
                price_keywords: DEFAULT_PRICE_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            },
            normalizer: NormalizerConfig {
                filler_phrases: DEFAULT_FILLER_PHRASES.iter().map(|p| p.to_string()).collect(),
                corrections: DEFAULT_CORRECTIONS
                    .iter()
                    .map(|(from, to)| (from.to_string(), to.to_string()))
                    .collect(),
            },
            cleaner: CleanerConfig {
                min_price: DEFAULT_MIN_PRICE,
                max_price: DEFAULT_MAX_PRICE,
                iqr_fence: DEFAULT_FENCE,
            },
            scraping: ScrapingConfig {
                source_timeout_secs: 12,
                request_timeout_secs: default_request_timeout_secs(),
                overall_timeout_secs: 180,
                max_proxy_attempts: 5,
                user_agents: default_user_agents(),
            },
            sources: default_sources(),
            cache: CacheConfig {
                backend: CacheBackend::Sqlite,
                path: PathBuf::from("harga-bot.db"),
                ttl_secs: Some(6 * 60 * 60),
            },
            proxy: ProxyConfig {
                addresses: Vec::new(),
                list_path: None,
                max_failures: 3,
            },
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, validated like a loaded file
    pub fn load_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Environment overrides on top of whatever was loaded
    pub fn apply_env(&mut self) {
        if let Ok(path) = std::env::var("HARGA_CACHE_PATH") {
            self.cache.path = PathBuf::from(path);
        }

        if let Ok(ttl) = std::env::var("HARGA_CACHE_TTL_SECS") {
            match ttl.trim() {
                "" | "none" | "never" => self.cache.ttl_secs = None,
                value => match value.parse() {
                    Ok(secs) => self.cache.ttl_secs = Some(secs),
                    Err(_) => tracing::warn!("Ignoring invalid HARGA_CACHE_TTL_SECS: {}", value),
                },
            }
        }

        if let Ok(list) = std::env::var("HARGA_PROXY_LIST") {
            self.proxy.list_path = Some(PathBuf::from(list));
        }

        if let Ok(timeout) = std::env::var("HARGA_OVERALL_TIMEOUT_SECS") {
            match timeout.trim().parse() {
                Ok(secs) => self.scraping.overall_timeout_secs = secs,
                Err(_) => tracing::warn!("Ignoring invalid HARGA_OVERALL_TIMEOUT_SECS: {}", timeout),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cleaner.min_price == 0 || self.cleaner.min_price > self.cleaner.max_price {
            return Err(ConfigError::InvalidValue(format!(
                "cleaner price band [{}, {}] is empty or starts at zero",
                self.cleaner.min_price, self.cleaner.max_price
            )));
        }

        if !self.cleaner.iqr_fence.is_finite() || self.cleaner.iqr_fence < 0.0 {
            return Err(ConfigError::InvalidValue(format!(
                "iqr-fence must be a non-negative number, got {}",
                self.cleaner.iqr_fence
            )));
        }

        if self.scraping.source_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue("source-timeout-secs must be positive".to_string()));
        }

        // One direct request plus every proxy retry has to fit in the source budget
        let request_budget = self
            .scraping
            .request_timeout_secs
            .saturating_mul(1 + u64::from(self.scraping.max_proxy_attempts));
        if self.scraping.request_timeout_secs == 0 || request_budget > self.scraping.source_timeout_secs {
            return Err(ConfigError::InvalidValue(format!(
                "request-timeout-secs ({}) x (1 + max-proxy-attempts ({})) must be positive and fit in source-timeout-secs ({})",
                self.scraping.request_timeout_secs, self.scraping.max_proxy_attempts, self.scraping.source_timeout_secs
            )));
        }

        if self.scraping.overall_timeout_secs <= self.scraping.source_timeout_secs {
            return Err(ConfigError::InvalidValue(format!(
                "overall-timeout-secs ({}) must exceed source-timeout-secs ({})",
                self.scraping.overall_timeout_secs, self.scraping.source_timeout_secs
            )));
        }

        if self.scraping.user_agents.is_empty() {
            return Err(ConfigError::MissingField("scraping.user-agents".to_string()));
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(ConfigError::MissingField("sources[].name".to_string()));
            }
            if !names.insert(source.name.as_str()) {
                return Err(ConfigError::InvalidValue(format!("duplicate source '{}'", source.name)));
            }
            if !source.search_url.contains(QUERY_PLACEHOLDER) {
                return Err(ConfigError::InvalidValue(format!(
                    "search-url of '{}' has no {} placeholder",
                    source.name, QUERY_PLACEHOLDER
                )));
            }
        }

        Ok(())
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.scraping.source_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.scraping.request_timeout_secs)
    }

    pub fn overall_timeout(&self) -> Duration {
        Duration::from_secs(self.scraping.overall_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache.ttl_secs.map(Duration::from_secs)
    }

    pub fn normalizer(&self) -> QueryNormalizer {
        let corrections: HashMap<String, String> = self
            .normalizer
            .corrections
            .iter()
            .map(|(from, to)| (from.clone(), to.clone()))
            .collect();
        QueryNormalizer::new(&self.normalizer.filler_phrases, &corrections)
    }

    pub fn cleaner(&self) -> PriceCleaner {
        PriceCleaner::new(self.cleaner.min_price, self.cleaner.max_price)
    }

    pub fn outlier_filter(&self) -> OutlierFilter {
        OutlierFilter::new(self.cleaner.iqr_fence)
    }
}
