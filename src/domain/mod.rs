//! Domain layer: models, per-component errors, and the ports that the
//! application/services layers depend on instead of concrete adapters.

pub mod error;
pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
