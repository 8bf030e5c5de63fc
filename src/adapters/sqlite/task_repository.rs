//! SQLite implementation of `TaskRepository` (AgentTask bookkeeping).

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentTask, AgentTaskStatus};
use crate::domain::ports::{AgentTaskFilter, TaskRepository};

#[derive(sqlx::FromRow)]
struct AgentTaskRow {
    task_id: String,
    project_id: String,
    workflow_id: String,
    stage_id: String,
    tool_name: String,
    tool_params_json: String,
    input_target: String,
    agent_id: Option<String>,
    status: String,
    required_tags_json: String,
    timeout_secs: i64,
    retry_count: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<AgentTaskRow> for AgentTask {
    type Error = anyhow::Error;

    fn try_from(row: AgentTaskRow) -> Result<Self, Self::Error> {
        Ok(AgentTask {
            task_id: Uuid::parse_str(&row.task_id)?,
            project_id: Uuid::parse_str(&row.project_id)?,
            workflow_id: Uuid::parse_str(&row.workflow_id)?,
            stage_id: Uuid::parse_str(&row.stage_id)?,
            tool_name: row.tool_name,
            tool_params: serde_json::from_str(&row.tool_params_json)?,
            input_target: row.input_target,
            agent_id: row.agent_id,
            status: AgentTaskStatus::parse_str(&row.status).unwrap_or(AgentTaskStatus::Pending),
            required_tags: serde_json::from_str::<HashSet<String>>(&row.required_tags_json)?,
            timeout: Duration::from_secs(row.timeout_secs as u64),
            retry_count: row.retry_count as u32,
            created_at: row.created_at.parse::<DateTime<Utc>>()?,
            updated_at: row.updated_at.parse::<DateTime<Utc>>()?,
        })
    }
}

pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn create(&self, task: &AgentTask) -> DomainResult<()> {
        let tool_params_json = serde_json::to_string(&task.tool_params)?;
        let required_tags_json = serde_json::to_string(&task.required_tags)?;

        sqlx::query(
            r#"INSERT INTO agent_tasks (task_id, project_id, workflow_id, stage_id, tool_name,
               tool_params_json, input_target, agent_id, status, required_tags_json,
               timeout_secs, retry_count, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(task.task_id.to_string())
        .bind(task.project_id.to_string())
        .bind(task.workflow_id.to_string())
        .bind(task.stage_id.to_string())
        .bind(&task.tool_name)
        .bind(&tool_params_json)
        .bind(&task.input_target)
        .bind(&task.agent_id)
        .bind(task.status.as_str())
        .bind(&required_tags_json)
        .bind(task.timeout.as_secs() as i64)
        .bind(task.retry_count as i64)
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, task_id: Uuid) -> DomainResult<Option<AgentTask>> {
        let row: Option<AgentTaskRow> = sqlx::query_as("SELECT * FROM agent_tasks WHERE task_id = ?")
            .bind(task_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| AgentTask::try_from(r).map_err(|e| crate::domain::errors::DomainError::ValidationFailed(e.to_string())))
            .transpose()
    }

    async fn update(&self, task: &AgentTask) -> DomainResult<()> {
        let required_tags_json = serde_json::to_string(&task.required_tags)?;
        sqlx::query(
            r#"UPDATE agent_tasks SET agent_id = ?, status = ?, required_tags_json = ?,
               retry_count = ?, updated_at = ? WHERE task_id = ?"#,
        )
        .bind(&task.agent_id)
        .bind(task.status.as_str())
        .bind(&required_tags_json)
        .bind(task.retry_count as i64)
        .bind(task.updated_at.to_rfc3339())
        .bind(task.task_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(&self, filter: AgentTaskFilter) -> DomainResult<Vec<AgentTask>> {
        let mut sql = "SELECT * FROM agent_tasks WHERE 1 = 1".to_string();
        if filter.status.is_some() {
            sql.push_str(" AND status = ?");
        }
        if filter.project_id.is_some() {
            sql.push_str(" AND project_id = ?");
        }
        if filter.agent_id.is_some() {
            sql.push_str(" AND agent_id = ?");
        }

        let mut query = sqlx::query_as::<_, AgentTaskRow>(&sql);
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(project_id) = filter.project_id {
            query = query.bind(project_id.to_string());
        }
        if let Some(agent_id) = filter.agent_id {
            query = query.bind(agent_id);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|r| AgentTask::try_from(r).map_err(|e| crate::domain::errors::DomainError::ValidationFailed(e.to_string())))
            .collect()
    }

    async fn list_pending(&self) -> DomainResult<Vec<AgentTask>> {
        let rows: Vec<AgentTaskRow> = sqlx::query_as("SELECT * FROM agent_tasks WHERE status = 'assigned'")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|r| AgentTask::try_from(r).map_err(|e| crate::domain::errors::DomainError::ValidationFailed(e.to_string())))
            .collect()
    }
}
