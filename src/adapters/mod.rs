//! Adapters: concrete implementations of the domain's ports.

pub mod http;
pub mod sqlite;
