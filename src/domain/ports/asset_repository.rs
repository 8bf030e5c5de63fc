//! Asset repository port: upserts with the merge policy from §4.7.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AssetHost, AssetService, AssetVuln, AssetWeb};

#[async_trait]
pub trait AssetRepository: Send + Sync {
    async fn upsert_host(&self, project_id: Uuid, ip: &str, hostname: Option<&str>, os: Option<&str>) -> DomainResult<AssetHost>;

    async fn upsert_service(&self, service: AssetService) -> DomainResult<AssetService>;

    async fn upsert_web(&self, url: &str, title: Option<&str>, tech_stack: Vec<String>) -> DomainResult<AssetWeb>;

    async fn upsert_vuln(&self, vuln: AssetVuln) -> DomainResult<AssetVuln>;

    async fn get_service(&self, host_id: Uuid, port: u16, proto: &str) -> DomainResult<Option<AssetService>>;
}
