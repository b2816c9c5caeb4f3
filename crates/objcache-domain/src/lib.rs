//! # Object Cache - Domain Model
//!
//! Pure types shared by the cache facade, the remote stores and the
//! operator CLI: how a cache key is derived, how a group is classified,
//! how a requested expiry is capped, and how the remote tier is flushed.
//!
//! Nothing in this crate performs I/O.
//!
//! ## Key layout
//!
//! ```text
//! {salt}{blog_prefix}{group}:{key}
//!
//!   salt          operator-configured, empty by default
//!   blog_prefix   "{blog_id}:" on multisite, omitted for global groups
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Group used when a caller passes an empty group name.
pub const DEFAULT_GROUP: &str = "default";

// =============================================================================
// VALUE OBJECTS
// =============================================================================

/// Site identifier inside a multisite network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlogId(pub u64);

impl Default for BlogId {
    fn default() -> Self {
        Self(1)
    }
}

impl fmt::Display for BlogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Substitute the default group for an empty (or blank) group name.
#[must_use]
pub fn resolve_group(group: &str) -> &str {
    let trimmed = group.trim();
    if trimmed.is_empty() {
        DEFAULT_GROUP
    } else {
        trimmed
    }
}

/// Reject keys that are empty once surrounding whitespace is removed.
///
/// # Errors
///
/// Returns [`DomainError::InvalidKey`] for blank keys.
pub fn validate_key(key: &str) -> Result<&str, DomainError> {
    if key.trim().is_empty() {
        return Err(DomainError::InvalidKey(key.to_string()));
    }
    Ok(key)
}

// =============================================================================
// ENUMS
// =============================================================================

/// Classification of a cache group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupClass {
    /// Shared network-wide, persisted, no blog prefix
    Global,
    /// Process-local only
    NonPersistent,
    /// Process-local only, configured by the operator
    Ignored,
    /// Persisted with the current blog prefix
    Ordinary,
}

impl GroupClass {
    /// Whether entries of this class reach the remote store.
    #[must_use]
    pub const fn is_persistent(self) -> bool {
        matches!(self, Self::Global | Self::Ordinary)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::NonPersistent => "non_persistent",
            Self::Ignored => "ignored",
            Self::Ordinary => "ordinary",
        }
    }
}

/// How `flush` clears the remote tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushMode {
    /// Delete only keys under this installation's salt
    #[default]
    Selective,
    /// FLUSHDB: clears every key in the selected database
    Full,
}

impl FlushMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Selective => "selective",
            Self::Full => "full",
        }
    }
}

impl FromStr for FlushMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "selective" => Ok(Self::Selective),
            "full" => Ok(Self::Full),
            other => Err(DomainError::UnknownFlushMode(other.to_string())),
        }
    }
}

// =============================================================================
// GROUP POLICY
// =============================================================================

/// Registered group sets.
///
/// A group listed in several sets resolves with the precedence
/// ignored > non-persistent > global.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPolicy {
    global: BTreeSet<String>,
    non_persistent: BTreeSet<String>,
    ignored: BTreeSet<String>,
}

impl GroupPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_global<I, S>(&mut self, groups: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        extend_groups(&mut self.global, groups);
    }

    pub fn add_non_persistent<I, S>(&mut self, groups: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        extend_groups(&mut self.non_persistent, groups);
    }

    pub fn add_ignored<I, S>(&mut self, groups: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        extend_groups(&mut self.ignored, groups);
    }

    /// Classify an already-resolved group name.
    #[must_use]
    pub fn classify(&self, group: &str) -> GroupClass {
        if self.ignored.contains(group) {
            GroupClass::Ignored
        } else if self.non_persistent.contains(group) {
            GroupClass::NonPersistent
        } else if self.global.contains(group) {
            GroupClass::Global
        } else {
            GroupClass::Ordinary
        }
    }

    #[must_use]
    pub fn is_global(&self, group: &str) -> bool {
        self.global.contains(group)
    }

    #[must_use]
    pub fn is_persistent(&self, group: &str) -> bool {
        self.classify(group).is_persistent()
    }

    pub fn global_groups(&self) -> impl Iterator<Item = &str> {
        self.global.iter().map(String::as_str)
    }

    pub fn non_persistent_groups(&self) -> impl Iterator<Item = &str> {
        self.non_persistent.iter().map(String::as_str)
    }

    pub fn ignored_groups(&self) -> impl Iterator<Item = &str> {
        self.ignored.iter().map(String::as_str)
    }
}

fn extend_groups<I, S>(set: &mut BTreeSet<String>, groups: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    set.extend(
        groups
            .into_iter()
            .map(|g| g.as_ref().trim().to_string())
            .filter(|g| !g.is_empty()),
    );
}

// =============================================================================
// KEY CONSTRUCTION
// =============================================================================

/// Builds derived keys and flush patterns for one installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBuilder {
    salt: String,
    multisite: bool,
    blog_id: BlogId,
}

impl KeyBuilder {
    pub fn new(salt: impl Into<String>, multisite: bool, blog_id: BlogId) -> Self {
        Self {
            salt: salt.into(),
            multisite,
            blog_id,
        }
    }

    #[must_use]
    pub fn salt(&self) -> &str {
        &self.salt
    }

    #[must_use]
    pub const fn multisite(&self) -> bool {
        self.multisite
    }

    #[must_use]
    pub const fn blog_id(&self) -> BlogId {
        self.blog_id
    }

    pub fn switch_to_blog(&mut self, blog_id: BlogId) {
        self.blog_id = blog_id;
    }

    /// Prefix inserted between salt and group. Empty for global groups and
    /// single-site installations.
    #[must_use]
    pub fn blog_prefix(&self, global: bool) -> String {
        if global || !self.multisite {
            String::new()
        } else {
            format!("{}:", self.blog_id)
        }
    }

    /// `{salt}{blog_prefix}{group}:{key}`
    #[must_use]
    pub fn derive(&self, key: &str, group: &str, global: bool) -> String {
        format!("{}{}{group}:{key}", self.salt, self.blog_prefix(global))
    }

    /// Glob matching every remote key of `group` under the current blog.
    #[must_use]
    pub fn group_pattern(&self, group: &str, global: bool) -> String {
        let prefix = format!("{}{}{group}:", self.salt, self.blog_prefix(global));
        format!("{}*", escape_glob(&prefix))
    }

    /// Glob matching every remote key written by this installation.
    #[must_use]
    pub fn installation_pattern(&self) -> String {
        format!("{}*", escape_glob(&self.salt))
    }
}

impl Default for KeyBuilder {
    fn default() -> Self {
        Self::new("", false, BlogId::default())
    }
}

// =============================================================================
// TTL POLICY
// =============================================================================

/// Caps caller-requested expiry at an operator-configured maximum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlPolicy {
    /// Maximum TTL in seconds; 0 leaves caller expiry uncapped
    pub max_ttl: u64,
}

impl TtlPolicy {
    #[must_use]
    pub const fn new(max_ttl: u64) -> Self {
        Self { max_ttl }
    }

    /// Effective TTL in seconds, `None` meaning the entry never expires.
    ///
    /// A requested expiry of 0 means "never"; with a maximum configured
    /// that becomes the maximum.
    #[must_use]
    pub const fn effective(self, requested: u64) -> Option<u64> {
        match (requested, self.max_ttl) {
            (0, 0) => None,
            (r, 0) => Some(r),
            (0, max) => Some(max),
            (r, max) if r > max => Some(max),
            (r, _) => Some(r),
        }
    }
}

// =============================================================================
// GLOB HELPERS
// =============================================================================

/// Escape Redis glob metacharacters so `s` matches literally.
#[must_use]
pub fn escape_glob(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Match `candidate` against a Redis `KEYS`-style glob.
///
/// Supports `*`, `?`, `[abc]`, `[^abc]`, `[a-z]` and `\` escapes.
#[must_use]
pub fn glob_matches(pattern: &str, candidate: &str) -> bool {
    glob_bytes(pattern.as_bytes(), candidate.as_bytes())
}

fn glob_bytes(pattern: &[u8], s: &[u8]) -> bool {
    let (mut p, mut i) = (0, 0);
    // most recent star: pattern index after it, candidate index it resumes at
    let mut star: Option<(usize, usize)> = None;

    while i < s.len() {
        if pattern.get(p) == Some(&b'*') {
            p += 1;
            star = Some((p, i));
            continue;
        }
        if let Some(width) = match_one(&pattern[p..], s[i]) {
            p += width;
            i += 1;
            continue;
        }
        let Some((after_star, resume)) = star else {
            return false;
        };
        p = after_star;
        i = resume + 1;
        star = Some((after_star, i));
    }
    pattern[p..].iter().all(|&c| c == b'*')
}

/// Match one non-star token against `ch`, returning the token's width.
fn match_one(pattern: &[u8], ch: u8) -> Option<usize> {
    match pattern {
        [] | [b'*', ..] => None,
        [b'?', ..] => Some(1),
        [b'[', rest @ ..] => {
            let (matched, after) = match_class(rest, ch);
            matched.then(|| pattern.len() - after.len())
        }
        [b'\\', escaped, ..] => (*escaped == ch).then_some(2),
        [c, ..] => (*c == ch).then_some(1),
    }
}

fn match_class(pattern: &[u8], ch: u8) -> (bool, &[u8]) {
    let (negate, mut p) = match pattern {
        [b'^', rest @ ..] => (true, rest),
        _ => (false, pattern),
    };
    let mut matched = false;
    loop {
        match p {
            // unterminated class ends with the pattern
            [] => break,
            [b']', rest @ ..] => {
                p = rest;
                break;
            }
            [b'\\', escaped, rest @ ..] => {
                matched |= *escaped == ch;
                p = rest;
            }
            [lo, b'-', hi, rest @ ..] if *hi != b']' => {
                let (lo, hi) = if lo <= hi { (*lo, *hi) } else { (*hi, *lo) };
                matched |= (lo..=hi).contains(&ch);
                p = rest;
            }
            [c, rest @ ..] => {
                matched |= *c == ch;
                p = rest;
            }
        }
    }
    (matched != negate, p)
}

// =============================================================================
// ERRORS
// =============================================================================

/// Domain-level errors
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Invalid cache key: {0:?}")]
    InvalidKey(String),

    #[error("Unknown flush mode: {0}")]
    UnknownFlushMode(String),
}
