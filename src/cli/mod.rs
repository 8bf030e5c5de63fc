//! CLI surface: argument types, result rendering, and per-subcommand handlers.

pub mod commands;
pub mod display;
pub mod types;

pub use types::{Cli, Commands, ProxyMode, ScanMode};
