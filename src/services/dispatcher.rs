//! Master Dispatcher / Resource Allocator (§4.5). For each pending
//! `AgentTask`, the allocator walks candidate agents and returns the
//! first that passes capability, tag, and rate-gate filters. Failing a
//! filter skips the agent for this task — it is never demoted.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use tracing::debug;

use crate::domain::error::DispatchError;
use crate::domain::models::{Agent, AgentTask};
use crate::domain::ports::TagRepository;

type AgentRateLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Per-agent "N per interval" gate. Built on `governor`'s keyed direct
/// rate limiter rather than a hand-rolled timestamp map: the allocator
/// only needs "has this agent been dispatched to too recently", which is
/// exactly a quota-of-one-per-`min_interval` check.
pub struct DispatchGate {
    limiter: AgentRateLimiter,
}

impl DispatchGate {
    pub fn new(min_interval: std::time::Duration) -> Self {
        let quota = Quota::with_period(min_interval).expect("min_interval must be nonzero");
        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }

    /// Checks whether `agent_id` may receive a dispatch right now. Only
    /// consumes the quota on success, per §4.5 ("gate only increments
    /// timer on success") — a rejected check must not itself count.
    pub fn check(&self, agent_id: &str) -> bool {
        self.limiter.check_key(&agent_id.to_string()).is_ok()
    }
}

impl Default for DispatchGate {
    fn default() -> Self {
        Self::new(std::time::Duration::from_millis(200))
    }
}

/// Picks the first agent (from `candidates`, in order) that is online,
/// supports `task.tool_name`, and whose resolved tags are a superset of
/// `task.required_tags`, then passes the dispatch gate.
pub async fn allocate(
    task: &AgentTask,
    candidates: &[Agent],
    tag_repo: &dyn TagRepository,
    gate: &DispatchGate,
) -> Result<Agent, DispatchError> {
    use crate::domain::models::EntityType;

    for agent in candidates {
        if agent.status != crate::domain::models::AgentStatus::Online {
            continue;
        }
        if !agent.supports(&task.tool_name) {
            continue;
        }

        let resolved_tags = tag_repo
            .list_for_entity(EntityType::Agent, &agent.agent_id)
            .await
            .map(|links| links.into_iter().map(|l| l.tag_id.to_string()).collect::<std::collections::HashSet<_>>())
            .unwrap_or_default();
        let agent_tags: std::collections::HashSet<String> =
            agent.tags.union(&resolved_tags).cloned().collect();

        if !task.required_tags.is_subset(&agent_tags) {
            continue;
        }

        if !gate.check(&agent.agent_id) {
            debug!(agent_id = %agent.agent_id, "rate-gated, trying next candidate");
            continue;
        }

        return Ok(agent.clone());
    }
    Err(DispatchError::NoCandidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{AgentHardware, AgentStatus, AgentTask};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashSet;
    use uuid::Uuid;

    struct EmptyTagRepo;

    #[async_trait]
    impl TagRepository for EmptyTagRepo {
        async fn create_tag(&self, _tag: &crate::domain::models::Tag) -> crate::domain::DomainResult<()> {
            Ok(())
        }
        async fn get_tag(&self, _id: Uuid) -> crate::domain::DomainResult<Option<crate::domain::models::Tag>> {
            Ok(None)
        }
        async fn list_tags(&self) -> crate::domain::DomainResult<Vec<crate::domain::models::Tag>> {
            Ok(vec![])
        }
        async fn create_rule(&self, _rule: &crate::domain::models::MatchRule) -> crate::domain::DomainResult<()> {
            Ok(())
        }
        async fn list_rules_for(
            &self,
            _entity_type: crate::domain::models::EntityType,
        ) -> crate::domain::DomainResult<Vec<crate::domain::models::MatchRule>> {
            Ok(vec![])
        }
        async fn link(&self, _entity_tag: &crate::domain::models::EntityTag) -> crate::domain::DomainResult<()> {
            Ok(())
        }
        async fn unlink(
            &self,
            _entity_type: crate::domain::models::EntityType,
            _entity_id: &str,
            _tag_id: Uuid,
        ) -> crate::domain::DomainResult<()> {
            Ok(())
        }
        async fn list_for_entity(
            &self,
            _entity_type: crate::domain::models::EntityType,
            _entity_id: &str,
        ) -> crate::domain::DomainResult<Vec<crate::domain::models::EntityTag>> {
            Ok(vec![])
        }
    }

    fn agent(id: &str, support: &[&str], tags: &[&str]) -> Agent {
        Agent {
            agent_id: id.to_string(),
            hostname: id.to_string(),
            ip: "10.0.0.1".to_string(),
            port: 9000,
            hardware: AgentHardware {
                os: "linux".into(),
                arch: "x86_64".into(),
                cpu_cores: 4,
                mem_total: 8192,
                disk_total: 100_000,
            },
            status: AgentStatus::Online,
            last_heartbeat: Utc::now(),
            token: "tok".into(),
            token_expiry: Utc::now(),
            task_support: support.iter().map(|s| s.to_string()).collect(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn agent_task(tool: &str, required_tags: &[&str]) -> AgentTask {
        AgentTask::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            tool,
            serde_json::json!({}),
            "10.0.0.1",
            required_tags.iter().map(|s| s.to_string()).collect::<HashSet<_>>(),
            std::time::Duration::from_secs(30),
        )
    }

    #[tokio::test]
    async fn dispatch_filter_matches_capability_and_tags() {
        let a = agent("a1", &["alive", "port"], &["prod"]);
        let gate = DispatchGate::new(std::time::Duration::from_millis(1));

        let task = agent_task("port", &["prod"]);
        let result = allocate(&task, &[a.clone()], &EmptyTagRepo, &gate).await;
        assert!(result.is_ok());

        let web_task = agent_task("web", &[]);
        let result = allocate(&web_task, &[a.clone()], &EmptyTagRepo, &gate).await;
        assert!(matches!(result, Err(DispatchError::NoCandidate)));

        let dmz_task = agent_task("port", &["dmz"]);
        let result = allocate(&dmz_task, &[a], &EmptyTagRepo, &gate).await;
        assert!(matches!(result, Err(DispatchError::NoCandidate)));
    }

    #[tokio::test]
    async fn offline_agents_are_skipped() {
        let mut a = agent("a1", &["port"], &[]);
        a.status = AgentStatus::Offline;
        let gate = DispatchGate::default();
        let task = agent_task("port", &[]);
        let result = allocate(&task, &[a], &EmptyTagRepo, &gate).await;
        assert!(matches!(result, Err(DispatchError::NoCandidate)));
    }
}
