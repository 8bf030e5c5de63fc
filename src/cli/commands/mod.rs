//! One handler module per top-level subcommand.

pub mod proxy;
pub mod scan;
pub mod server;
