//! ETLError repository port, including replay support.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::EtlErrorRecord;

#[async_trait]
pub trait EtlErrorRepository: Send + Sync {
    async fn create(&self, record: &EtlErrorRecord) -> DomainResult<()>;
    async fn get(&self, id: Uuid) -> DomainResult<Option<EtlErrorRecord>>;
    async fn update(&self, record: &EtlErrorRecord) -> DomainResult<()>;
    async fn list_new(&self) -> DomainResult<Vec<EtlErrorRecord>>;
    async fn list_all(&self) -> DomainResult<Vec<EtlErrorRecord>>;
}
