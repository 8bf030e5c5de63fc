//! AgentTask (Master-side bookkeeping) repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentTask, AgentTaskStatus};

#[derive(Debug, Clone, Default)]
pub struct AgentTaskFilter {
    pub status: Option<AgentTaskStatus>,
    pub project_id: Option<Uuid>,
    pub agent_id: Option<String>,
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, task: &AgentTask) -> DomainResult<()>;

    async fn get(&self, task_id: Uuid) -> DomainResult<Option<AgentTask>>;

    async fn update(&self, task: &AgentTask) -> DomainResult<()>;

    async fn list(&self, filter: AgentTaskFilter) -> DomainResult<Vec<AgentTask>>;

    /// Tasks assigned to `agent_id` that are ready to hand back to it
    /// (status = assigned), used by the Agent's pull endpoint.
    async fn list_pending(&self) -> DomainResult<Vec<AgentTask>>;
}
