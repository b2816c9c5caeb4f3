//! # Object Cache Persistence Library
//!
//! Two-tier object cache: a process-local map in front of a shared remote
//! store (Redis in production).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Application Layer                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ObjectCache facade                       │
//! │     (group policy, key derivation, TTL cap, strategies)      │
//! └─────────────────────────────────────────────────────────────┘
//!                    │                   │
//!                    ▼                   ▼
//! ┌─────────────────────────┐   ┌──────────────────────────────┐
//! │      Local tier         │   │     RemoteStore (Redis)      │
//! │  (per handle, no TTL)   │   │  (persistent groups only)    │
//! └─────────────────────────┘   └──────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - `redis`: Enable the Redis remote store (default)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use objcache_persistence::{ObjectCache, ObjectCacheConfig};
//! use serde_json::json;
//!
//! let config = ObjectCacheConfig::from_env();
//! let mut cache = ObjectCache::connect(&config)?;
//!
//! cache.set("alloptions", json!({"blogname": "Example"}), "options", 3600).await;
//! let options = cache.get("alloptions", "options", false).await;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod facade;
pub mod strategy;

// Re-export commonly used types
#[cfg(feature = "redis")]
pub use cache::RedisStore;
pub use cache::{InMemoryStore, RemoteStore, SharedRemoteStore};
pub use config::{ObjectCacheConfig, RedisConfig, Transport};
pub use error::{PersistenceError, Result};
pub use facade::{CacheStats, CacheStatus, ObjectCache};
pub use strategy::{ReadStrategy, WriteStrategy};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
