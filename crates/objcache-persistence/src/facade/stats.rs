//! Per-handle counters and diagnostics snapshot.

use chrono::{DateTime, Utc};
use objcache_domain::{BlogId, FlushMode};
use serde::Serialize;
use std::time::Duration;

/// Hit/miss and remote round-trip counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub remote_calls: u64,
    pub remote_errors: u64,
    /// Cumulative time spent waiting on the remote store
    pub remote_time_us: u64,
}

impl CacheStats {
    pub(crate) fn record_remote(&mut self, elapsed: Duration, ok: bool) {
        self.remote_calls += 1;
        self.remote_time_us = self
            .remote_time_us
            .saturating_add(u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX));
        if !ok {
            self.remote_errors += 1;
        }
    }

    /// Fraction of lookups served from either tier, 0.0 before any lookup.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Diagnostics snapshot for operators
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    /// Remote backend name, `None` when running local-only
    pub backend: Option<&'static str>,
    pub reachable: bool,
    pub db_size: Option<u64>,
    pub server_version: Option<String>,
    pub salt: String,
    pub flush_mode: FlushMode,
    pub max_ttl: u64,
    pub multisite: bool,
    pub blog_id: BlogId,
    pub global_groups: Vec<String>,
    pub non_persistent_groups: Vec<String>,
    pub ignored_groups: Vec<String>,
    pub local_entries: usize,
    pub stats: CacheStats,
    /// Share of lookups served from either tier
    pub hit_ratio: f64,
    pub checked_at: DateTime<Utc>,
}
