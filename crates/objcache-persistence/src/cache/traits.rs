//! # Remote Store Trait
//!
//! The command surface the facade needs from its backing store.
//! Implementations can be swapped (Redis, in-memory, ...).

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

/// Backing store for the persistent tier.
///
/// Values are opaque encoded strings; keys are fully derived.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Short backend name for diagnostics
    fn backend(&self) -> &'static str;

    /// GET
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// MGET, one slot per requested key in order
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>>;

    /// SETEX when `ttl` is given, plain SET otherwise
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// SET ... KEEPTTL: replace the value, leaving any expiry in place
    async fn set_keep_ttl(&self, key: &str, value: &str) -> Result<()>;

    /// INCRBY: atomic add on an integer value. A missing key starts at 0;
    /// a non-integer value is an error and is left untouched.
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64>;

    /// DEL, `true` if the key existed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// DEL over many keys, returning how many existed
    async fn delete_many(&self, keys: &[String]) -> Result<u64>;

    /// EXISTS
    async fn exists(&self, key: &str) -> Result<bool>;

    /// KEYS with a Redis glob
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// FLUSHDB on the selected database
    async fn flush_db(&self) -> Result<()>;

    /// PING
    async fn ping(&self) -> Result<()>;

    /// DBSIZE
    async fn db_size(&self) -> Result<u64>;

    /// Server version string, when the backend reports one
    async fn server_version(&self) -> Result<Option<String>>;
}

/// Shared remote store handle
pub type SharedRemoteStore = Arc<dyn RemoteStore>;
