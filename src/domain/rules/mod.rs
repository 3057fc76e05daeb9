//! Domain rules - Pure stages of the price pipeline

pub mod clean;
pub mod normalize;
pub mod outlier;

pub use clean::PriceCleaner;
pub use normalize::QueryNormalizer;
pub use outlier::OutlierFilter;
