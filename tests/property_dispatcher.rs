use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use neoscan::domain::models::{Agent, AgentHardware, AgentStatus, AgentTask, EntityTag, EntityType, MatchRule, Tag};
use neoscan::domain::ports::TagRepository;
use neoscan::domain::DomainResult;
use neoscan::services::dispatcher::{allocate, DispatchGate};
use proptest::prelude::*;
use uuid::Uuid;

struct EmptyTagRepo;

#[async_trait]
impl TagRepository for EmptyTagRepo {
    async fn create_tag(&self, _tag: &Tag) -> DomainResult<()> {
        Ok(())
    }
    async fn get_tag(&self, _id: Uuid) -> DomainResult<Option<Tag>> {
        Ok(None)
    }
    async fn list_tags(&self) -> DomainResult<Vec<Tag>> {
        Ok(vec![])
    }
    async fn create_rule(&self, _rule: &MatchRule) -> DomainResult<()> {
        Ok(())
    }
    async fn list_rules_for(&self, _entity_type: EntityType) -> DomainResult<Vec<MatchRule>> {
        Ok(vec![])
    }
    async fn link(&self, _entity_tag: &EntityTag) -> DomainResult<()> {
        Ok(())
    }
    async fn unlink(&self, _entity_type: EntityType, _entity_id: &str, _tag_id: Uuid) -> DomainResult<()> {
        Ok(())
    }
    async fn list_for_entity(&self, _entity_type: EntityType, _entity_id: &str) -> DomainResult<Vec<EntityTag>> {
        Ok(vec![])
    }
}

fn agent(id: &str, online: bool, support: &[String], tags: &[String]) -> Agent {
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
        status: if online { AgentStatus::Online } else { AgentStatus::Offline },
        last_heartbeat: Utc::now(),
        token: "tok".into(),
        token_expiry: Utc::now(),
        task_support: support.iter().cloned().collect(),
        tags: tags.iter().cloned().collect(),
    }
}

fn agent_task(tool: &str, required_tags: &[String]) -> AgentTask {
    AgentTask::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        Uuid::new_v4(),
        tool,
        serde_json::json!({}),
        "10.0.0.1",
        required_tags.iter().cloned().collect::<HashSet<_>>(),
        Duration::from_secs(30),
    )
}

const TOOLS: [&str; 3] = ["port", "web", "brute"];
const TAGS: [&str; 3] = ["prod", "dmz", "internal"];

fn subset(names: &[&str], mask: u8) -> Vec<String> {
    names
        .iter()
        .enumerate()
        .filter(|(i, _)| mask & (1 << i) != 0)
        .map(|(_, s)| s.to_string())
        .collect()
}

proptest! {
    /// Whatever the candidate pool, `allocate` never returns an agent that
    /// is offline, doesn't support the task's tool, or whose tags are not
    /// a superset of the task's required tags.
    #[test]
    fn prop_allocate_only_returns_eligible_agents(
        online_mask in 0u8..16,
        support_masks in proptest::collection::vec(0u8..8, 1..5),
        tag_masks in proptest::collection::vec(0u8..8, 1..5),
        task_tool_idx in 0usize..3,
        task_tag_mask in 0u8..8,
    ) {
        let task = agent_task(TOOLS[task_tool_idx], &subset(&TAGS, task_tag_mask));
        let gate = DispatchGate::new(Duration::from_nanos(1));

        let n = support_masks.len().min(tag_masks.len());
        let candidates: Vec<Agent> = (0..n)
            .map(|i| {
                let online = online_mask & (1 << (i % 4)) != 0;
                agent(
                    &format!("a{i}"),
                    online,
                    &subset(&TOOLS, support_masks[i]),
                    &subset(&TAGS, tag_masks[i]),
                )
            })
            .collect();

        let rt = tokio::runtime::Runtime::new().unwrap();
        let result = rt.block_on(allocate(&task, &candidates, &EmptyTagRepo, &gate));

        if let Ok(chosen) = result {
            prop_assert_eq!(chosen.status, AgentStatus::Online);
            prop_assert!(chosen.supports(&task.tool_name));
            prop_assert!(task.required_tags.is_subset(&chosen.tags));
        }
    }

    /// A single online, capable, tag-matching agent with an always-open
    /// gate is always chosen.
    #[test]
    fn prop_sole_eligible_agent_is_always_chosen(
        task_tool_idx in 0usize..3,
        task_tag_mask in 0u8..8,
    ) {
        let required = subset(&TAGS, task_tag_mask);
        let task = agent_task(TOOLS[task_tool_idx], &required);
        let a = agent("only", true, &[TOOLS[task_tool_idx].to_string()], &required);
        let gate = DispatchGate::new(Duration::from_nanos(1));

        let rt = tokio::runtime::Runtime::new().unwrap();
        let result = rt.block_on(allocate(&task, &[a.clone()], &EmptyTagRepo, &gate));
        prop_assert!(result.is_ok());
        prop_assert_eq!(result.unwrap().agent_id, a.agent_id);
    }
}
