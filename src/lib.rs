//! NeoScan: a distributed security-scanning platform split into a
//! Master control plane and a fleet of Agents. This crate hosts both
//! binaries' shared domain, application, and adapter code.

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;
