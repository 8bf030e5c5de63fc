//! Concrete `Runner` implementations, one per `TaskType`.

pub mod alive;
pub mod brute;
pub mod os_fingerprint;
pub mod port_service;
pub mod service_probes;
pub mod web;
