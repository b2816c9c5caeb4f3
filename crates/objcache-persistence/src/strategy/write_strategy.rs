//! Write strategy selection using enum dispatch.

/// Write strategy enum - determines which tiers a write reaches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteStrategy {
    /// Write local, then remote. A failed remote write does not undo the
    /// local one and the operation still reports success.
    #[default]
    WriteThrough,
    /// Write the local tier only
    LocalOnly,
}

impl WriteStrategy {
    /// `persistent`: the group reaches a connected remote store
    #[must_use]
    pub const fn select(persistent: bool) -> Self {
        if persistent {
            Self::WriteThrough
        } else {
            Self::LocalOnly
        }
    }

    #[must_use]
    pub const fn writes_remote(self) -> bool {
        matches!(self, Self::WriteThrough)
    }
}
