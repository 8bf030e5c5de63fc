//! Raw-evidence archive port. Archive failure is logged but never blocks
//! queueing (§4.6) — at-least-once semantics, dedupe happens at ETL.

use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait Archiver: Send + Sync {
    async fn archive(&self, key: &str, evidence: &Value) -> std::io::Result<()>;
}

/// Archiver that discards everything — used in tests and anywhere
/// archival is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullArchiver;

#[async_trait]
impl Archiver for NullArchiver {
    async fn archive(&self, _key: &str, _evidence: &Value) -> std::io::Result<()> {
        Ok(())
    }
}
