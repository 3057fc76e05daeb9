//! Domain entities - Values that flow through the price pipeline

pub mod price;
pub mod query;

pub use price::{format_rupiah, CachedSummary, CleanedPrice, PriceSet, PriceSummary, RawPriceToken};
pub use query::NormalizedQuery;
