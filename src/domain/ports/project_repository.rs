//! Project/Workflow/ScanStage repository ports.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Project, ScanStage, Workflow};

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn create(&self, project: &Project) -> DomainResult<()>;
    async fn get(&self, id: Uuid) -> DomainResult<Option<Project>>;
    async fn update(&self, project: &Project) -> DomainResult<()>;
    async fn list(&self) -> DomainResult<Vec<Project>>;
}

#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn create(&self, workflow: &Workflow) -> DomainResult<()>;
    async fn get(&self, id: Uuid) -> DomainResult<Option<Workflow>>;
    async fn list_for_project(&self, project_id: Uuid) -> DomainResult<Vec<Workflow>>;

    async fn create_stage(&self, stage: &ScanStage) -> DomainResult<()>;
    async fn list_stages(&self, workflow_id: Uuid) -> DomainResult<Vec<ScanStage>>;
}
