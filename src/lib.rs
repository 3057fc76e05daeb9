//! harga-bot - price range lookups for Indonesian marketplaces

pub mod application;
pub mod domain;
pub mod infrastructure;
