//! AgentTask: the Master-side bookkeeping row for a task assigned to an agent.
//!
//! The state machine is strict: `pending -> assigned -> running -> {completed, failed, cancelled}`.
//! There is no backward transition; a retry allocates a fresh `task_id` rather than
//! rewinding this one (§3, §8 invariant).

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::task::TaskType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentTaskStatus {
    Pending,
    Assigned,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl AgentTaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "assigned" => Some(Self::Assigned),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Valid next states from this status. Empty for terminal states.
    pub fn valid_transitions(&self) -> &'static [AgentTaskStatus] {
        match self {
            Self::Pending => &[Self::Assigned, Self::Cancelled],
            Self::Assigned => &[Self::Running, Self::Cancelled],
            Self::Running => &[Self::Completed, Self::Failed, Self::Cancelled],
            Self::Completed | Self::Failed | Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: AgentTaskStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTask {
    pub task_id: Uuid,
    pub project_id: Uuid,
    pub workflow_id: Uuid,
    pub stage_id: Uuid,
    pub tool_name: String,
    pub tool_params: Value,
    pub input_target: String,
    pub agent_id: Option<String>,
    pub status: AgentTaskStatus,
    pub required_tags: HashSet<String>,
    pub timeout: std::time::Duration,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentTask {
    pub fn new(
        project_id: Uuid,
        workflow_id: Uuid,
        stage_id: Uuid,
        tool_name: impl Into<String>,
        tool_params: Value,
        input_target: impl Into<String>,
        required_tags: HashSet<String>,
        timeout: std::time::Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            task_id: Uuid::new_v4(),
            project_id,
            workflow_id,
            stage_id,
            tool_name: tool_name.into(),
            tool_params,
            input_target: input_target.into(),
            agent_id: None,
            status: AgentTaskStatus::Pending,
            required_tags,
            timeout,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn tool_type(&self) -> Option<TaskType> {
        TaskType::parse_str(&self.tool_name)
    }

    /// Attempt a state transition, returning the old status on success.
    pub fn transition(&mut self, next: AgentTaskStatus) -> Result<AgentTaskStatus, String> {
        if !self.status.can_transition_to(next) {
            return Err(format!(
                "invalid transition from {:?} to {:?}",
                self.status, next
            ));
        }
        let old = self.status;
        self.status = next;
        self.updated_at = Utc::now();
        Ok(old)
    }

    /// Assign to an agent: `pending -> assigned`.
    pub fn assign(&mut self, agent_id: impl Into<String>) -> Result<(), String> {
        self.transition(AgentTaskStatus::Assigned)?;
        self.agent_id = Some(agent_id.into());
        Ok(())
    }

    /// Allocate a fresh retry: a brand-new AgentTask with `retry_count` incremented,
    /// never a rewind of `self`. `self` should be left in its terminal `failed` state.
    pub fn retry(&self) -> Self {
        let mut next = Self::new(
            self.project_id,
            self.workflow_id,
            self.stage_id,
            self.tool_name.clone(),
            self.tool_params.clone(),
            self.input_target.clone(),
            self.required_tags.clone(),
            self.timeout,
        );
        next.retry_count = self.retry_count + 1;
        next
    }
}
