//! Two-tier object cache.

use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::future::Future;
use std::time::{Duration, Instant};

use objcache_domain::{
    BlogId, FlushMode, GroupClass, GroupPolicy, KeyBuilder, TtlPolicy, resolve_group,
    validate_key,
};

use super::local_tier::LocalTier;
use super::stats::{CacheStats, CacheStatus};
use crate::cache::{RemoteStore, SharedRemoteStore};
use crate::codec;
use crate::config::ObjectCacheConfig;
use crate::error::Result;
use crate::strategy::{ReadStrategy, WriteStrategy};

/// Optional operations this cache implements, as reported by [`ObjectCache::supports`].
pub const SUPPORTED_FEATURES: &[&str] = &[
    "add_multiple",
    "set_multiple",
    "get_multiple",
    "delete_multiple",
    "flush_runtime",
    "flush_group",
];

/// Keys deleted per DEL during pattern flushes
const DELETE_BATCH: usize = 500;

/// A resolved key: group name, derived remote key and classification.
#[derive(Debug, Clone)]
struct Slot {
    group: String,
    derived: String,
    class: GroupClass,
}

/// Object cache handle.
///
/// One handle serves one request (or one task). Lookups consult the
/// process-local tier first and the remote store for groups that persist.
/// Remote failures are logged and degrade to misses; they never reach the
/// caller.
pub struct ObjectCache {
    remote: Option<SharedRemoteStore>,
    keys: KeyBuilder,
    policy: GroupPolicy,
    ttl: TtlPolicy,
    flush_mode: FlushMode,
    local: LocalTier,
    stats: CacheStats,
}

impl ObjectCache {
    /// Create a handle over `remote`. A disabled configuration or `None`
    /// yields a local-only cache.
    pub fn new(config: &ObjectCacheConfig, remote: Option<SharedRemoteStore>) -> Self {
        let remote = if config.disabled { None } else { remote };
        if remote.is_none() {
            tracing::debug!("Object cache running without a remote tier");
        }
        Self {
            remote,
            keys: config.key_builder(),
            policy: config.group_policy(),
            ttl: config.ttl_policy(),
            flush_mode: config.flush_mode,
            local: LocalTier::new(),
            stats: CacheStats::default(),
        }
    }

    /// Create a handle backed by Redis. The connection opens on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the Redis configuration is invalid.
    #[cfg(feature = "redis")]
    pub fn connect(config: &ObjectCacheConfig) -> Result<Self> {
        if config.disabled {
            return Ok(Self::new(config, None));
        }
        let store = crate::cache::RedisStore::new(config.redis.clone())?;
        Ok(Self::new(config, Some(std::sync::Arc::new(store))))
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Fetch a value. `force` bypasses the local tier for persistent groups.
    pub async fn get(&mut self, key: &str, group: &str, force: bool) -> Option<Value> {
        let slot = self.locate(key, group)?;
        let strategy = self.read_strategy(&slot, force);

        if strategy.checks_local() {
            if let Some(value) = self.local.get(&slot.group, &slot.derived) {
                self.stats.hits += 1;
                return Some(value.clone());
            }
        }

        let fetched = match self.remote.clone() {
            Some(remote) if strategy.reads_remote() => {
                self.fetch_remote(remote.as_ref(), &slot.derived).await
            }
            _ => None,
        };

        if let Some(value) = fetched {
            self.stats.hits += 1;
            self.local.insert(&slot.group, slot.derived, value.clone());
            Some(value)
        } else {
            self.stats.misses += 1;
            tracing::trace!(key = %slot.derived, class = slot.class.as_str(), "Cache miss");
            None
        }
    }

    /// Typed [`get`](Self::get); `None` on miss or when the stored value
    /// does not deserialize into `T`.
    pub async fn get_as<T: DeserializeOwned>(
        &mut self,
        key: &str,
        group: &str,
        force: bool,
    ) -> Option<T> {
        let value = self.get(key, group, force).await?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                tracing::debug!(key, group, error = %e, "Cached value has unexpected shape");
                None
            }
        }
    }

    /// Fetch several keys of one group. Local hits are served first; the
    /// rest are fetched with a single MGET.
    pub async fn get_multiple<S: AsRef<str>>(
        &mut self,
        keys: &[S],
        group: &str,
        force: bool,
    ) -> Vec<(String, Option<Value>)> {
        let mut results: Vec<(String, Option<Value>)> = Vec::with_capacity(keys.len());
        let mut pending: Vec<(usize, Slot)> = Vec::new();

        for key in keys {
            let key = key.as_ref();
            let Some(slot) = self.locate(key, group) else {
                results.push((key.to_string(), None));
                continue;
            };
            let strategy = self.read_strategy(&slot, force);

            if strategy.checks_local() {
                if let Some(value) = self.local.get(&slot.group, &slot.derived) {
                    self.stats.hits += 1;
                    results.push((key.to_string(), Some(value.clone())));
                    continue;
                }
            }

            results.push((key.to_string(), None));
            if strategy.reads_remote() {
                pending.push((results.len() - 1, slot));
            } else {
                self.stats.misses += 1;
            }
        }

        if pending.is_empty() {
            return results;
        }
        let Some(remote) = self.remote.clone() else {
            self.stats.misses += pending.len() as u64;
            return results;
        };

        let derived: Vec<String> = pending.iter().map(|(_, slot)| slot.derived.clone()).collect();
        let fetched = self
            .remote_call("mget", remote.get_many(&derived))
            .await
            .unwrap_or_default();

        let fetched = fetched.into_iter().chain(std::iter::repeat(None));
        for ((index, slot), raw) in pending.into_iter().zip(fetched) {
            match raw.and_then(|raw| decode_logged(&slot.derived, &raw)) {
                Some(value) => {
                    self.stats.hits += 1;
                    self.local.insert(&slot.group, slot.derived, value.clone());
                    results[index].1 = Some(value);
                }
                None => self.stats.misses += 1,
            }
        }

        results
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Store a value. `expire` is in seconds, 0 meaning "no expiry"; it is
    /// capped at the configured maximum TTL.
    ///
    /// Returns `true` whenever the local tier was updated, even if the
    /// remote write failed.
    pub async fn set(&mut self, key: &str, value: Value, group: &str, expire: u64) -> bool {
        let Some(slot) = self.locate(key, group) else {
            return false;
        };
        self.store(slot, value, expire).await
    }

    /// Typed [`set`](Self::set).
    pub async fn set_as<T: Serialize>(
        &mut self,
        key: &str,
        value: &T,
        group: &str,
        expire: u64,
    ) -> bool {
        match serde_json::to_value(value) {
            Ok(value) => self.set(key, value, group, expire).await,
            Err(e) => {
                tracing::warn!(key, group, error = %e, "Value is not serializable");
                false
            }
        }
    }

    pub async fn set_multiple(
        &mut self,
        items: Vec<(String, Value)>,
        group: &str,
        expire: u64,
    ) -> Vec<(String, bool)> {
        let mut results = Vec::with_capacity(items.len());
        for (key, value) in items {
            let stored = self.set(&key, value, group, expire).await;
            results.push((key, stored));
        }
        results
    }

    /// Store only if the key exists in neither tier.
    pub async fn add(&mut self, key: &str, value: Value, group: &str, expire: u64) -> bool {
        let Some(slot) = self.locate(key, group) else {
            return false;
        };
        if self.exists(&slot).await {
            return false;
        }
        self.store(slot, value, expire).await
    }

    pub async fn add_multiple(
        &mut self,
        items: Vec<(String, Value)>,
        group: &str,
        expire: u64,
    ) -> Vec<(String, bool)> {
        let mut results = Vec::with_capacity(items.len());
        for (key, value) in items {
            let added = self.add(&key, value, group, expire).await;
            results.push((key, added));
        }
        results
    }

    /// Store only if the key exists in at least one tier.
    pub async fn replace(&mut self, key: &str, value: Value, group: &str, expire: u64) -> bool {
        let Some(slot) = self.locate(key, group) else {
            return false;
        };
        if !self.exists(&slot).await {
            return false;
        }
        self.store(slot, value, expire).await
    }

    /// Remove a key from both tiers; `true` if either tier held it.
    pub async fn delete(&mut self, key: &str, group: &str) -> bool {
        let Some(slot) = self.locate(key, group) else {
            return false;
        };
        let local = self.local.remove(&slot.group, &slot.derived);
        let remote = match self.remote_for(&slot) {
            Some(remote) => self
                .remote_call("del", remote.delete(&slot.derived))
                .await
                .unwrap_or(false),
            None => false,
        };
        local || remote
    }

    pub async fn delete_multiple<S: AsRef<str>>(
        &mut self,
        keys: &[S],
        group: &str,
    ) -> Vec<(String, bool)> {
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            let key = key.as_ref();
            let deleted = self.delete(key, group).await;
            results.push((key.to_string(), deleted));
        }
        results
    }

    /// Add `offset` to a counter. Non-numeric values count as zero and the
    /// result never drops below zero. `None` if the key does not exist.
    ///
    /// Persistent groups use the store's atomic INCRBY, which keeps the
    /// entry's TTL. Non-persistent groups, values INCRBY rejects and remote
    /// outages fall back to arithmetic on the cached value.
    pub async fn incr(&mut self, key: &str, offset: i64, group: &str) -> Option<i64> {
        let slot = self.locate(key, group)?;

        if let Some(remote) = self.remote_for(&slot) {
            if !self.exists(&slot).await {
                return None;
            }
            if let Ok(total) = self
                .remote_call("incrby", remote.incr_by(&slot.derived, offset))
                .await
            {
                let next = total.max(0);
                if total < 0 {
                    self.write_counter(&slot, next).await;
                } else {
                    self.local.insert(&slot.group, slot.derived.clone(), Value::from(next));
                }
                return Some(next);
            }
            tracing::debug!(key = %slot.derived, "INCRBY unavailable, updating cached value");
        }

        let current = self.get(key, group, false).await?;
        let next = codec::coerce_counter(&current).saturating_add(offset).max(0);
        self.write_counter(&slot, next).await;
        Some(next)
    }

    /// Subtract `offset` from a counter, clamping at zero.
    pub async fn decr(&mut self, key: &str, offset: i64, group: &str) -> Option<i64> {
        self.incr(key, offset.saturating_neg(), group).await
    }

    // =========================================================================
    // FLUSHING
    // =========================================================================

    /// Clear the local tier and this installation's remote entries (or the
    /// whole remote database in full mode). `false` only if the remote step
    /// failed.
    pub async fn flush(&mut self) -> bool {
        self.local.clear();
        let Some(remote) = self.remote.clone() else {
            return true;
        };

        tracing::info!(mode = self.flush_mode.as_str(), "Flushing object cache");
        let result = match self.flush_mode {
            FlushMode::Full => {
                tracing::warn!("Flushing the entire remote database");
                self.remote_call("flushdb", remote.flush_db()).await
            }
            FlushMode::Selective => {
                if self.keys.salt().is_empty() {
                    tracing::warn!("Selective flush without a salt removes every key in the database");
                }
                let pattern = self.keys.installation_pattern();
                self.delete_matching(remote.as_ref(), &pattern).await.map(|_| ())
            }
        };
        result.is_ok()
    }

    /// Remove every entry of `group`: all of it from the local tier, and
    /// for persistent groups the current blog's keys from the remote store.
    pub async fn flush_group(&mut self, group: &str) -> bool {
        let group = resolve_group(group).to_string();
        let removed = self.local.remove_group(&group);
        tracing::debug!(group = %group, removed, "Flushed group from local tier");

        let class = self.policy.classify(&group);
        if !class.is_persistent() {
            return true;
        }
        let Some(remote) = self.remote.clone() else {
            return true;
        };

        let pattern = self.keys.group_pattern(&group, self.policy.is_global(&group));
        self.delete_matching(remote.as_ref(), &pattern).await.is_ok()
    }

    /// Clear only the local tier.
    pub fn flush_runtime(&mut self) -> bool {
        self.local.clear();
        true
    }

    // =========================================================================
    // GROUPS, BLOGS, DIAGNOSTICS
    // =========================================================================

    pub fn add_global_groups<I, S>(&mut self, groups: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.policy.add_global(groups);
    }

    pub fn add_non_persistent_groups<I, S>(&mut self, groups: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.policy.add_non_persistent(groups);
    }

    pub fn add_ignored_groups<I, S>(&mut self, groups: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.policy.add_ignored(groups);
    }

    /// Subsequent non-global keys use `blog_id`'s prefix.
    pub fn switch_to_blog(&mut self, blog_id: BlogId) {
        self.keys.switch_to_blog(blog_id);
    }

    #[must_use]
    pub fn supports(&self, feature: &str) -> bool {
        SUPPORTED_FEATURES.contains(&feature)
    }

    #[must_use]
    pub const fn stats(&self) -> &CacheStats {
        &self.stats
    }

    #[must_use]
    pub const fn policy(&self) -> &GroupPolicy {
        &self.policy
    }

    #[must_use]
    pub const fn key_builder(&self) -> &KeyBuilder {
        &self.keys
    }

    #[must_use]
    pub fn local_len(&self) -> usize {
        self.local.len()
    }

    #[must_use]
    pub const fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Probe the remote store and report configuration and counters.
    pub async fn status(&mut self) -> CacheStatus {
        let (backend, reachable, db_size, server_version) = match self.remote.clone() {
            Some(remote) => {
                let reachable = self.remote_call("ping", remote.ping()).await.is_ok();
                let (db_size, version) = if reachable {
                    (
                        self.remote_call("dbsize", remote.db_size()).await.ok(),
                        self.remote_call("info", remote.server_version())
                            .await
                            .ok()
                            .flatten(),
                    )
                } else {
                    (None, None)
                };
                (Some(remote.backend()), reachable, db_size, version)
            }
            None => (None, false, None, None),
        };

        CacheStatus {
            backend,
            reachable,
            db_size,
            server_version,
            salt: self.keys.salt().to_string(),
            flush_mode: self.flush_mode,
            max_ttl: self.ttl.max_ttl,
            multisite: self.keys.multisite(),
            blog_id: self.keys.blog_id(),
            global_groups: self.policy.global_groups().map(str::to_string).collect(),
            non_persistent_groups: self
                .policy
                .non_persistent_groups()
                .map(str::to_string)
                .collect(),
            ignored_groups: self.policy.ignored_groups().map(str::to_string).collect(),
            local_entries: self.local.len(),
            stats: self.stats,
            hit_ratio: self.stats.hit_ratio(),
            checked_at: Utc::now(),
        }
    }

    /// Drop the remote handle; the cache keeps working local-only.
    pub fn close(&mut self) -> bool {
        if self.remote.take().is_some() {
            tracing::debug!("Remote tier closed");
        }
        true
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn locate(&self, key: &str, group: &str) -> Option<Slot> {
        if let Err(e) = validate_key(key) {
            tracing::warn!(group, error = %e, "Rejected cache key");
            return None;
        }
        let group = resolve_group(group);
        let class = self.policy.classify(group);
        let derived = self.keys.derive(key, group, self.policy.is_global(group));
        Some(Slot {
            group: group.to_string(),
            derived,
            class,
        })
    }

    fn remote_for(&self, slot: &Slot) -> Option<SharedRemoteStore> {
        if slot.class.is_persistent() {
            self.remote.clone()
        } else {
            None
        }
    }

    fn read_strategy(&self, slot: &Slot, force: bool) -> ReadStrategy {
        ReadStrategy::select(self.remote_for(slot).is_some(), force)
    }

    fn write_strategy(&self, slot: &Slot) -> WriteStrategy {
        WriteStrategy::select(self.remote_for(slot).is_some())
    }

    async fn store(&mut self, slot: Slot, value: Value, expire: u64) -> bool {
        let remote = if self.write_strategy(&slot).writes_remote() {
            self.remote.clone()
        } else {
            None
        };
        let encoded = match &remote {
            Some(_) => match codec::encode(&value) {
                Ok(raw) => Some(raw),
                Err(e) => {
                    tracing::warn!(key = %slot.derived, error = %e, "Failed to encode value");
                    None
                }
            },
            None => None,
        };

        self.local.insert(&slot.group, slot.derived.clone(), value);

        if let (Some(remote), Some(raw)) = (remote, encoded) {
            let ttl = self.ttl.effective(expire).map(Duration::from_secs);
            if self
                .remote_call("set", remote.set(&slot.derived, &raw, ttl))
                .await
                .is_err()
            {
                tracing::debug!(key = %slot.derived, "Remote write failed, local value kept");
            }
        }
        true
    }

    /// Write a counter to both tiers without touching the remote TTL.
    async fn write_counter(&mut self, slot: &Slot, next: i64) {
        self.local.insert(&slot.group, slot.derived.clone(), Value::from(next));
        if let Some(remote) = self.remote_for(slot) {
            let raw = next.to_string();
            if self
                .remote_call("set", remote.set_keep_ttl(&slot.derived, &raw))
                .await
                .is_err()
            {
                tracing::debug!(key = %slot.derived, "Remote counter write failed, local value kept");
            }
        }
    }

    async fn exists(&mut self, slot: &Slot) -> bool {
        if self.local.contains(&slot.group, &slot.derived) {
            return true;
        }
        match self.remote_for(slot) {
            Some(remote) => self
                .remote_call("exists", remote.exists(&slot.derived))
                .await
                .unwrap_or(false),
            None => false,
        }
    }

    async fn fetch_remote(&mut self, remote: &dyn RemoteStore, derived: &str) -> Option<Value> {
        let raw = self.remote_call("get", remote.get(derived)).await.ok()??;
        decode_logged(derived, &raw)
    }

    async fn delete_matching(&mut self, remote: &dyn RemoteStore, pattern: &str) -> Result<u64> {
        let keys = self.remote_call("keys", remote.keys(pattern)).await?;
        let mut deleted = 0;
        for chunk in keys.chunks(DELETE_BATCH) {
            deleted += self.remote_call("del", remote.delete_many(chunk)).await?;
        }
        tracing::debug!(pattern, matched = keys.len(), deleted, "Deleted remote keys");
        Ok(deleted)
    }

    /// Await a remote command, recording latency and logging failures.
    async fn remote_call<T, F>(&mut self, op: &'static str, command: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let result = command.await;
        self.stats.record_remote(started.elapsed(), result.is_ok());
        if let Err(e) = &result {
            tracing::warn!(op, error = %e, "Remote cache command failed");
        }
        result
    }
}

fn decode_logged(derived: &str, raw: &str) -> Option<Value> {
    match codec::decode(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key = %derived, error = %e, "Discarding undecodable remote value");
            None
        }
    }
}
