//! # Cache Configuration
//!
//! Two layers, lowest precedence first:
//!
//! 1. stored defaults, a JSON settings document (every field optional)
//! 2. operator overrides, `OBJCACHE_*` environment variables
//!
//! Malformed override values are logged and ignored so a typo in the
//! environment never takes the cache down.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use objcache_domain::{BlogId, FlushMode, GroupPolicy, KeyBuilder, TtlPolicy};

use crate::error::{PersistenceError, Result};

/// Prefix shared by every override variable.
pub const ENV_PREFIX: &str = "OBJCACHE_";

/// Transport used to reach Redis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Tcp,
    Tls,
    Unix,
}

impl Transport {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tcp" | "redis" => Some(Self::Tcp),
            "tls" | "rediss" => Some(Self::Tls),
            "unix" | "socket" => Some(Self::Unix),
            _ => None,
        }
    }
}

/// Redis connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub scheme: Transport,
    pub host: String,
    pub port: u16,
    /// Socket path, used when `scheme` is `unix`
    pub path: Option<PathBuf>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: i64,
    /// Accept invalid certificates on TLS connections
    pub tls_insecure: bool,
    pub timeout_ms: u64,
    pub read_timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            scheme: Transport::Tcp,
            host: "127.0.0.1".to_string(),
            port: 6379,
            path: None,
            username: None,
            password: None,
            database: 0,
            tls_insecure: false,
            timeout_ms: 1000,
            read_timeout_ms: 1000,
        }
    }
}

impl RedisConfig {
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[must_use]
    pub const fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Human-readable endpoint without credentials, for logs.
    #[must_use]
    pub fn endpoint(&self) -> String {
        match self.scheme {
            Transport::Tcp => format!("redis://{}:{}/{}", self.host, self.port, self.database),
            Transport::Tls => format!("rediss://{}:{}/{}", self.host, self.port, self.database),
            Transport::Unix => format!(
                "unix://{}?db={}",
                self.path.as_deref().map_or_else(String::new, |p| p.display().to_string()),
                self.database
            ),
        }
    }

    /// Reject configurations that cannot produce a connection.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::InvalidConfig`] describing the problem.
    pub fn validate(&self) -> Result<()> {
        match self.scheme {
            Transport::Unix if self.path.is_none() => Err(PersistenceError::InvalidConfig(
                "unix transport requires a socket path".to_string(),
            )),
            Transport::Tcp | Transport::Tls if self.host.trim().is_empty() => Err(
                PersistenceError::InvalidConfig("host must not be empty".to_string()),
            ),
            Transport::Tcp | Transport::Tls if self.port == 0 => Err(
                PersistenceError::InvalidConfig("port must be non-zero".to_string()),
            ),
            _ if self.database < 0 => Err(PersistenceError::InvalidConfig(format!(
                "database index {} is negative",
                self.database
            ))),
            _ => Ok(()),
        }
    }
}

/// Full object-cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectCacheConfig {
    pub redis: RedisConfig,
    /// Prefix for every remote key; changing it orphans existing entries
    pub salt: String,
    /// Maximum TTL in seconds, 0 for uncapped
    pub max_ttl: u64,
    pub flush_mode: FlushMode,
    pub global_groups: Vec<String>,
    pub non_persistent_groups: Vec<String>,
    pub ignored_groups: Vec<String>,
    pub multisite: bool,
    pub blog_id: BlogId,
    /// Skip the remote tier entirely
    pub disabled: bool,
}

impl Default for ObjectCacheConfig {
    fn default() -> Self {
        Self {
            redis: RedisConfig::default(),
            salt: String::new(),
            max_ttl: 0,
            flush_mode: FlushMode::Selective,
            global_groups: Vec::new(),
            non_persistent_groups: Vec::new(),
            ignored_groups: vec![
                "counts".to_string(),
                "plugins".to_string(),
                "themes".to_string(),
            ],
            multisite: false,
            blog_id: BlogId::default(),
            disabled: false,
        }
    }
}

impl ObjectCacheConfig {
    /// Stored defaults from `settings` (when given) overridden by the
    /// process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings document cannot be read or parsed.
    pub fn load(settings: Option<&Path>) -> Result<Self> {
        let stored = match settings {
            Some(path) => Self::from_settings_file(path)?,
            None => Self::default(),
        };
        Ok(stored.with_overrides(|name| env::var(name).ok()))
    }

    /// Defaults only, overridden by the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_overrides(|name| env::var(name).ok())
    }

    /// Parse a JSON settings document.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::InvalidConfig`] on I/O or parse failure.
    pub fn from_settings_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PersistenceError::InvalidConfig(format!("reading {}: {e}", path.display()))
        })?;
        Self::from_settings_json(&raw)
    }

    /// # Errors
    ///
    /// Returns [`PersistenceError::InvalidConfig`] if `raw` is not a valid
    /// settings document.
    pub fn from_settings_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| PersistenceError::InvalidConfig(format!("settings document: {e}")))
    }

    /// Apply operator overrides. `lookup` receives the full variable name
    /// (`OBJCACHE_HOST`, ...) and returns its value when set.
    #[must_use]
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(v) = get("SCHEME") {
            match Transport::parse(&v) {
                Some(scheme) => self.redis.scheme = scheme,
                None => warn_ignored("SCHEME", &v),
            }
        }
        if let Some(v) = get("HOST") {
            self.redis.host = v;
        }
        parse_into(&get, "PORT", &mut self.redis.port);
        if let Some(v) = get("PATH") {
            self.redis.path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("USERNAME") {
            self.redis.username = Some(v);
        }
        if let Some(v) = get("PASSWORD") {
            self.redis.password = Some(v);
        }
        parse_into(&get, "DATABASE", &mut self.redis.database);
        parse_into(&get, "TIMEOUT_MS", &mut self.redis.timeout_ms);
        parse_into(&get, "READ_TIMEOUT_MS", &mut self.redis.read_timeout_ms);
        flag_into(&get, "TLS_INSECURE", &mut self.redis.tls_insecure);

        if let Some(v) = get("SALT") {
            self.salt = v;
        }
        parse_into(&get, "MAXTTL", &mut self.max_ttl);
        parse_into(&get, "FLUSH_MODE", &mut self.flush_mode);
        if let Some(v) = get("GLOBAL_GROUPS") {
            self.global_groups = split_list(&v);
        }
        if let Some(v) = get("NON_PERSISTENT_GROUPS") {
            self.non_persistent_groups = split_list(&v);
        }
        if let Some(v) = get("IGNORED_GROUPS") {
            self.ignored_groups = split_list(&v);
        }
        flag_into(&get, "MULTISITE", &mut self.multisite);
        if let Some(v) = get("BLOG_ID") {
            match v.trim().parse() {
                Ok(id) => self.blog_id = BlogId(id),
                Err(_) => warn_ignored("BLOG_ID", &v),
            }
        }
        flag_into(&get, "DISABLED", &mut self.disabled);

        self
    }

    #[must_use]
    pub fn key_builder(&self) -> KeyBuilder {
        KeyBuilder::new(self.salt.clone(), self.multisite, self.blog_id)
    }

    #[must_use]
    pub fn group_policy(&self) -> GroupPolicy {
        let mut policy = GroupPolicy::new();
        policy.add_global(&self.global_groups);
        policy.add_non_persistent(&self.non_persistent_groups);
        policy.add_ignored(&self.ignored_groups);
        policy
    }

    #[must_use]
    pub const fn ttl_policy(&self) -> TtlPolicy {
        TtlPolicy::new(self.max_ttl)
    }
}

fn parse_into<G, T>(get: &G, name: &str, slot: &mut T)
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(v) = get(name) {
        match v.trim().parse() {
            Ok(parsed) => *slot = parsed,
            Err(_) => warn_ignored(name, &v),
        }
    }
}

fn flag_into<G>(get: &G, name: &str, slot: &mut bool)
where
    G: Fn(&str) -> Option<String>,
{
    if let Some(v) = get(name) {
        *slot = matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on");
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(String::from)
        .collect()
}

fn warn_ignored(name: &str, value: &str) {
    tracing::warn!(variable = %format!("{ENV_PREFIX}{name}"), value, "Ignoring malformed override");
}
