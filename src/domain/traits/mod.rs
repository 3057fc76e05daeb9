//! Domain traits - Abstractions for infrastructure implementations

pub mod cache;
pub mod proxy;
pub mod scraper;

pub use cache::PriceCache;
pub use proxy::ProxyPool;
pub use scraper::SourceScraper;
