//! Read strategy selection using enum dispatch.

/// Read strategy enum - determines which tiers a lookup consults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadStrategy {
    /// Check local tier first, fall back to remote on miss
    #[default]
    LocalFirst,
    /// Bypass the local tier and read remote, repopulating local
    RemoteFirst,
    /// Only the local tier exists for this lookup
    LocalOnly,
}

impl ReadStrategy {
    /// Pick the strategy for a lookup.
    ///
    /// - `persistent`: the group reaches a connected remote store
    /// - `force`: the caller asked to bypass the local tier
    ///
    /// Forcing a lookup on a group without a remote tier still reads
    /// local, since that is the only copy there is.
    #[must_use]
    pub const fn select(persistent: bool, force: bool) -> Self {
        match (persistent, force) {
            (false, _) => Self::LocalOnly,
            (true, false) => Self::LocalFirst,
            (true, true) => Self::RemoteFirst,
        }
    }

    #[must_use]
    pub const fn checks_local(self) -> bool {
        matches!(self, Self::LocalFirst | Self::LocalOnly)
    }

    #[must_use]
    pub const fn reads_remote(self) -> bool {
        matches!(self, Self::LocalFirst | Self::RemoteFirst)
    }
}
