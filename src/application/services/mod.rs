//! Application services - Business logic orchestration

pub mod chat_service;
pub mod price_service;

pub use chat_service::ChatService;
pub use price_service::{AggregatorContext, PriceAggregator, PriceOutcome};
