//! # Facade Module
//!
//! The object-cache contract over a local map and an optional remote store.

mod local_tier;
mod object_cache;
mod stats;

#[cfg(test)]
mod tests;

pub use local_tier::LocalTier;
pub use object_cache::{ObjectCache, SUPPORTED_FEATURES};
pub use stats::{CacheStats, CacheStatus};
