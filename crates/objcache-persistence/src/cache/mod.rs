//! # Cache Module
//!
//! Remote stores backing the persistent tier.

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_client;
pub mod traits;

pub use memory::InMemoryStore;
#[cfg(feature = "redis")]
pub use redis_client::RedisStore;
pub use traits::{RemoteStore, SharedRemoteStore};
