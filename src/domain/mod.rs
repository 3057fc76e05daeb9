//! Domain layer - Core price logic with no I/O
//! 
//! This layer contains:
//! - Entities: Queries, price sets and summaries
//! - Rules: Pure pipeline stages (normalize, clean, filter)
//! - Traits: Abstractions for infrastructure (SourceScraper, PriceCache, ProxyPool)

pub mod entities;
pub mod rules;
pub mod traits;
