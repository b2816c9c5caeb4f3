//! In-memory remote store.
//!
//! Behaves like a single Redis database: TTLs expire lazily on access and
//! `keys` understands Redis globs. It also counts every command it serves
//! and can be switched into an outage mode where every command fails.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use objcache_domain::glob_matches;

use super::traits::RemoteStore;
use crate::error::{PersistenceError, Result};

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
    ttl: Option<Duration>,
}

impl StoredValue {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: DashMap<String, StoredValue>,
    calls: AtomicU64,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.data.iter().filter(|e| e.value().is_live(now)).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Commands served (or refused) so far
    #[must_use]
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Simulate a connection loss: every command fails while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    /// TTL the entry was written with, `None` for persistent or missing keys.
    #[must_use]
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.live(key).and_then(|v| v.ttl)
    }

    /// Raw stored string, bypassing call accounting.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.live(key).map(|v| v.value)
    }

    fn live(&self, key: &str) -> Option<StoredValue> {
        let now = Instant::now();
        let entry = self.data.get(key)?;
        if entry.is_live(now) {
            return Some(entry.value().clone());
        }
        drop(entry);
        self.data.remove_if(key, |_, v| !v.is_live(now));
        None
    }

    fn command(&self, op: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(PersistenceError::Unavailable(format!(
                "in-memory store offline ({op})"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.command("get")?;
        Ok(self.live(key).map(|v| v.value))
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        self.command("mget")?;
        Ok(keys.iter().map(|k| self.live(k).map(|v| v.value)).collect())
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.command("set")?;
        self.data.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at: ttl.map(|t| Instant::now() + t),
                ttl,
            },
        );
        Ok(())
    }

    async fn set_keep_ttl(&self, key: &str, value: &str) -> Result<()> {
        self.command("set")?;
        let now = Instant::now();
        let mut entry = self.data.entry(key.to_string()).or_insert_with(|| StoredValue {
            value: String::new(),
            expires_at: None,
            ttl: None,
        });
        if !entry.is_live(now) {
            entry.expires_at = None;
            entry.ttl = None;
        }
        entry.value = value.to_string();
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        self.command("incrby")?;
        let now = Instant::now();
        // the shard lock is held for the whole read-add-write
        let mut entry = self.data.entry(key.to_string()).or_insert_with(|| StoredValue {
            value: "0".to_string(),
            expires_at: None,
            ttl: None,
        });
        if !entry.is_live(now) {
            *entry = StoredValue {
                value: "0".to_string(),
                expires_at: None,
                ttl: None,
            };
        }
        let current: i64 = entry.value.parse().map_err(|_| {
            PersistenceError::Redis("ERR value is not an integer or out of range".to_string())
        })?;
        let next = current.checked_add(delta).ok_or_else(|| {
            PersistenceError::Redis("ERR increment or decrement would overflow".to_string())
        })?;
        entry.value = next.to_string();
        Ok(next)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.command("del")?;
        let now = Instant::now();
        Ok(self.data.remove(key).is_some_and(|(_, v)| v.is_live(now)))
    }

    async fn delete_many(&self, keys: &[String]) -> Result<u64> {
        self.command("del")?;
        let now = Instant::now();
        let removed = keys
            .iter()
            .filter(|k| self.data.remove(k.as_str()).is_some_and(|(_, v)| v.is_live(now)))
            .count();
        Ok(removed as u64)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.command("exists")?;
        Ok(self.live(key).is_some())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.command("keys")?;
        let now = Instant::now();
        Ok(self
            .data
            .iter()
            .filter(|e| e.value().is_live(now) && glob_matches(pattern, e.key()))
            .map(|e| e.key().clone())
            .collect())
    }

    async fn flush_db(&self) -> Result<()> {
        self.command("flushdb")?;
        self.data.clear();
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.command("ping")
    }

    async fn db_size(&self) -> Result<u64> {
        self.command("dbsize")?;
        Ok(self.len() as u64)
    }

    async fn server_version(&self) -> Result<Option<String>> {
        self.command("info")?;
        Ok(None)
    }
}
