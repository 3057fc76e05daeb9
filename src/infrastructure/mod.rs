//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: Configuration loading
//! - Cache: Price cache backends (SQLite, memory)
//! - Proxy: Rotating proxy pool
//! - Webcrawler and sources: Fetching marketplace search pages
//! - Adapters: Chat front ends

pub mod adapters;
pub mod cache;
pub mod config;
pub mod proxy;
pub mod sources;
pub mod webcrawler;
