//! Process-local tier.

use serde_json::Value;
use std::collections::HashMap;

/// Per-handle map of group -> derived key -> value.
///
/// Entries never expire on their own; they live until deleted, flushed,
/// or the handle is dropped.
#[derive(Debug, Default)]
pub struct LocalTier {
    groups: HashMap<String, HashMap<String, Value>>,
}

impl LocalTier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, group: &str, derived: &str) -> Option<&Value> {
        self.groups.get(group)?.get(derived)
    }

    #[must_use]
    pub fn contains(&self, group: &str, derived: &str) -> bool {
        self.get(group, derived).is_some()
    }

    pub fn insert(&mut self, group: &str, derived: String, value: Value) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(derived, value);
    }

    /// Returns whether the entry was present.
    pub fn remove(&mut self, group: &str, derived: &str) -> bool {
        let Some(entries) = self.groups.get_mut(group) else {
            return false;
        };
        let removed = entries.remove(derived).is_some();
        if entries.is_empty() {
            self.groups.remove(group);
        }
        removed
    }

    /// Drop every entry of `group`, returning how many there were.
    pub fn remove_group(&mut self, group: &str) -> usize {
        self.groups.remove(group).map_or(0, |entries| entries.len())
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.values().map(HashMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
