//! # Strategy Module
//!
//! Enum-based tier selection for the object-cache facade.
//!
//! ## Available Strategies
//!
//! ### Read Strategies
//! - `LocalFirst` - Check the local tier, fall back to remote on miss (default)
//! - `RemoteFirst` - Skip the local tier, read remote (forced reads)
//! - `LocalOnly` - Never touch the remote store
//!
//! ### Write Strategies
//! - `WriteThrough` - Write local, then remote; remote failure is logged only (default)
//! - `LocalOnly` - Write the local tier only
//!
//! ## Example
//!
//! ```rust
//! use objcache_persistence::strategy::{ReadStrategy, WriteStrategy};
//!
//! let read = ReadStrategy::select(true, false);
//! assert_eq!(read, ReadStrategy::LocalFirst);
//! assert!(WriteStrategy::select(true).writes_remote());
//! ```

pub mod read_strategy;
pub mod write_strategy;

pub use read_strategy::ReadStrategy;
pub use write_strategy::WriteStrategy;
