//! Ambient plumbing every binary needs: configuration loading and
//! logging setup.

pub mod config;
pub mod logging;

pub use config::{Config, ConfigLoader};
