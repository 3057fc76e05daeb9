//! Application layer - Use cases and business logic
//! 
//! This layer contains:
//! - Services: Price aggregation and chat handling
//! - Errors: Domain-specific errors

pub mod errors;
pub mod services;
