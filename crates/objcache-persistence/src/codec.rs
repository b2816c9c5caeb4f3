//! Value encoding for the remote tier.
//!
//! Values are JSON. Integers therefore land in Redis as bare decimal
//! strings, which keeps them readable from `redis-cli`.

use serde_json::Value;

use crate::error::Result;

/// Encode a cache value for the remote store.
pub fn encode(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Decode a value read from the remote store.
pub fn decode(raw: &str) -> Result<Value> {
    Ok(serde_json::from_str(raw)?)
}

/// Counter coercion for incr/decr: integers pass through, floats truncate,
/// numeric strings parse, everything else is zero.
#[must_use]
pub fn coerce_counter(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|u| i64::try_from(u).unwrap_or(i64::MAX)))
            .or_else(|| n.as_f64().map(truncate_f64))
            .unwrap_or(0),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(truncate_f64))
                .unwrap_or(0)
        }
        _ => 0,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn truncate_f64(f: f64) -> i64 {
    // `as` saturates at the i64 bounds
    f.trunc() as i64
}
