//! Subcommand execution against an [`ObjectCache`].

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use objcache_domain::FlushMode;
use objcache_persistence::{ObjectCache, ObjectCacheConfig};

use crate::args::Command;

#[derive(Debug, Serialize)]
struct Lookup<'a> {
    key: &'a str,
    group: &'a str,
    found: bool,
    value: Option<Value>,
}

#[derive(Debug, Serialize)]
struct Outcome<'a> {
    op: &'static str,
    key: Option<&'a str>,
    group: Option<&'a str>,
    ok: bool,
}

#[derive(Debug, Serialize)]
struct Counter<'a> {
    key: &'a str,
    group: &'a str,
    value: Option<i64>,
}

/// Apply per-command adjustments before the cache is built.
pub fn prepare_config(config: &mut ObjectCacheConfig, command: &Command) {
    if matches!(command, Command::Flush { full: true }) {
        config.flush_mode = FlushMode::Full;
    }
}

/// Parse a value argument as JSON, keeping it as a plain string otherwise.
#[must_use]
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Run one command and return its JSON report.
///
/// # Errors
///
/// Returns an error only if the report cannot be serialized; cache failures
/// are reported in the output itself.
pub async fn execute(cache: &mut ObjectCache, command: &Command) -> Result<Value> {
    let report = match command {
        Command::Status => serde_json::to_value(cache.status().await)?,
        Command::Get { key, group, force } => {
            let value = cache.get(key, group, *force).await;
            serde_json::to_value(Lookup {
                key,
                group,
                found: value.is_some(),
                value,
            })?
        }
        Command::Set {
            key,
            value,
            group,
            ttl,
        } => {
            let ok = cache.set(key, parse_value(value), group, *ttl).await;
            outcome("set", Some(key.as_str()), Some(group.as_str()), ok)?
        }
        Command::Delete { key, group } => {
            let ok = cache.delete(key, group).await;
            outcome("delete", Some(key.as_str()), Some(group.as_str()), ok)?
        }
        Command::Incr { key, group, by } => {
            let value = cache.incr(key, *by, group).await;
            serde_json::to_value(Counter { key, group, value })?
        }
        Command::Decr { key, group, by } => {
            let value = cache.decr(key, *by, group).await;
            serde_json::to_value(Counter { key, group, value })?
        }
        Command::Flush { .. } => {
            let ok = cache.flush().await;
            outcome("flush", None, None, ok)?
        }
        Command::FlushGroup { group } => {
            let ok = cache.flush_group(group).await;
            outcome("flush_group", None, Some(group.as_str()), ok)?
        }
    };

    tracing::debug!(command = ?command, "Command complete");
    Ok(report)
}

fn outcome(op: &'static str, key: Option<&str>, group: Option<&str>, ok: bool) -> Result<Value> {
    Ok(serde_json::to_value(Outcome { op, key, group, ok })?)
}

/// Render a report for stdout.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render(report: &Value, pretty: bool) -> Result<String> {
    let out = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    Ok(out)
}
