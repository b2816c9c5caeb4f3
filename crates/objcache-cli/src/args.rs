//! Command-line arguments.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "objcache")]
#[command(about = "Inspect and manage the Redis object cache", version)]
pub struct Args {
    /// JSON settings document holding stored defaults
    #[arg(short, long, global = true)]
    pub settings: Option<PathBuf>,

    /// Site to operate on in a multisite installation
    #[arg(long, global = true)]
    pub blog_id: Option<u64>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Plain, global = true)]
    pub log_format: LogFormat,

    /// Default log directive when RUST_LOG is unset
    #[arg(long, default_value = "warn", global = true)]
    pub log_level: String,

    /// Pretty-print command output
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Plain,
    Json,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Probe the remote store and print configuration
    Status,

    /// Read one entry
    Get {
        key: String,
        #[arg(short, long, default_value = "default")]
        group: String,
        /// Skip the local tier
        #[arg(short, long)]
        force: bool,
    },

    /// Store one entry; VALUE is parsed as JSON, falling back to a string
    Set {
        key: String,
        value: String,
        #[arg(short, long, default_value = "default")]
        group: String,
        /// Expiry in seconds, 0 for the configured maximum
        #[arg(short, long, default_value_t = 0)]
        ttl: u64,
    },

    /// Remove one entry
    Delete {
        key: String,
        #[arg(short, long, default_value = "default")]
        group: String,
    },

    /// Increment a numeric entry
    Incr {
        key: String,
        #[arg(short, long, default_value = "default")]
        group: String,
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        by: i64,
    },

    /// Decrement a numeric entry, never below zero
    Decr {
        key: String,
        #[arg(short, long, default_value = "default")]
        group: String,
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        by: i64,
    },

    /// Flush the cache using the configured flush mode
    Flush {
        /// Flush the whole database regardless of configuration
        #[arg(long)]
        full: bool,
    },

    /// Flush a single group for the current site
    FlushGroup { group: String },
}
