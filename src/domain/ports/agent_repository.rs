//! Agent repository port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Agent, AgentMetrics, AgentStatus};

#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// Upsert by hostname+ip (§3 lifecycle rule).
    async fn upsert(&self, agent: &Agent) -> DomainResult<()>;

    async fn get(&self, agent_id: &str) -> DomainResult<Option<Agent>>;

    /// Looks up the agent owning a bearer token (§3 Agent identity — each
    /// agent's token is its own credential, not the deployment secret).
    async fn find_by_token(&self, token: &str) -> DomainResult<Option<Agent>>;

    async fn update_status(&self, agent_id: &str, status: AgentStatus) -> DomainResult<()>;

    async fn touch_heartbeat(&self, agent_id: &str) -> DomainResult<()>;

    async fn list_online(&self) -> DomainResult<Vec<Agent>>;

    async fn list_all(&self) -> DomainResult<Vec<Agent>>;

    async fn record_metrics(&self, metrics: &AgentMetrics) -> DomainResult<()>;
}
