//! # objcache CLI
//!
//! Operator tooling for the Redis object cache: connection status,
//! single-entry reads and writes, counters, and flushes. Every command
//! prints one JSON report on stdout; logs go to stderr.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod args;
pub mod commands;

pub use args::{Args, Command, LogFormat};
pub use commands::{execute, parse_value, prepare_config, render};
