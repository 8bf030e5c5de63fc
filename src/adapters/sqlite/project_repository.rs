//! SQLite implementation of `ProjectRepository` and `WorkflowRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Project, ProjectStatus, ScanStage, TargetSource, Workflow};
use crate::domain::ports::{ProjectRepository, WorkflowRepository};

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: String,
    name: String,
    target_source_json: String,
    status: String,
    created_at: String,
}

impl TryFrom<ProjectRow> for Project {
    type Error = anyhow::Error;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        Ok(Project {
            id: Uuid::parse_str(&row.id)?,
            name: row.name,
            target_source: serde_json::from_str::<TargetSource>(&row.target_source_json)?,
            status: parse_project_status(&row.status),
            created_at: row.created_at.parse::<DateTime<Utc>>()?,
        })
    }
}

fn parse_project_status(s: &str) -> ProjectStatus {
    match s {
        "running" => ProjectStatus::Running,
        "paused" => ProjectStatus::Paused,
        "completed" => ProjectStatus::Completed,
        "cancelled" => ProjectStatus::Cancelled,
        _ => ProjectStatus::Draft,
    }
}

fn project_status_str(status: ProjectStatus) -> &'static str {
    match status {
        ProjectStatus::Draft => "draft",
        ProjectStatus::Running => "running",
        ProjectStatus::Paused => "paused",
        ProjectStatus::Completed => "completed",
        ProjectStatus::Cancelled => "cancelled",
    }
}

pub struct SqliteProjectRepository {
    pool: SqlitePool,
}

impl SqliteProjectRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectRepository for SqliteProjectRepository {
    async fn create(&self, project: &Project) -> DomainResult<()> {
        let target_source_json = serde_json::to_string(&project.target_source)?;
        sqlx::query(
            "INSERT INTO projects (id, name, target_source_json, status, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(project.id.to_string())
        .bind(&project.name)
        .bind(&target_source_json)
        .bind(project_status_str(project.status))
        .bind(project.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Project>> {
        let row: Option<ProjectRow> = sqlx::query_as("SELECT * FROM projects WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Project::try_from(r).map_err(|e| DomainError::ValidationFailed(e.to_string()))).transpose()
    }

    async fn update(&self, project: &Project) -> DomainResult<()> {
        let target_source_json = serde_json::to_string(&project.target_source)?;
        sqlx::query("UPDATE projects SET name = ?, target_source_json = ?, status = ? WHERE id = ?")
            .bind(&project.name)
            .bind(&target_source_json)
            .bind(project_status_str(project.status))
            .bind(project.id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self) -> DomainResult<Vec<Project>> {
        let rows: Vec<ProjectRow> = sqlx::query_as("SELECT * FROM projects").fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|r| Project::try_from(r).map_err(|e| DomainError::ValidationFailed(e.to_string())))
            .collect()
    }
}

#[derive(sqlx::FromRow)]
struct WorkflowRow {
    id: String,
    project_id: String,
    name: String,
}

impl TryFrom<WorkflowRow> for Workflow {
    type Error = anyhow::Error;

    fn try_from(row: WorkflowRow) -> Result<Self, Self::Error> {
        Ok(Workflow { id: Uuid::parse_str(&row.id)?, project_id: Uuid::parse_str(&row.project_id)?, name: row.name })
    }
}

#[derive(sqlx::FromRow)]
struct ScanStageRow {
    id: String,
    workflow_id: String,
    tool_name: String,
    tool_params_json: String,
    predecessors_json: String,
    execution_policy: String,
    required_tags_json: String,
}

impl TryFrom<ScanStageRow> for ScanStage {
    type Error = anyhow::Error;

    fn try_from(row: ScanStageRow) -> Result<Self, Self::Error> {
        use crate::domain::models::ExecutionPolicy;
        Ok(ScanStage {
            id: Uuid::parse_str(&row.id)?,
            workflow_id: Uuid::parse_str(&row.workflow_id)?,
            tool_name: row.tool_name,
            tool_params: serde_json::from_str::<Value>(&row.tool_params_json)?,
            predecessors: serde_json::from_str(&row.predecessors_json)?,
            execution_policy: if row.execution_policy == "sequential" { ExecutionPolicy::Sequential } else { ExecutionPolicy::Parallel },
            required_tags: serde_json::from_str(&row.required_tags_json)?,
        })
    }
}

pub struct SqliteWorkflowRepository {
    pool: SqlitePool,
}

impl SqliteWorkflowRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowRepository for SqliteWorkflowRepository {
    async fn create(&self, workflow: &Workflow) -> DomainResult<()> {
        sqlx::query("INSERT INTO workflows (id, project_id, name) VALUES (?, ?, ?)")
            .bind(workflow.id.to_string())
            .bind(workflow.project_id.to_string())
            .bind(&workflow.name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Workflow>> {
        let row: Option<WorkflowRow> = sqlx::query_as("SELECT * FROM workflows WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Workflow::try_from(r).map_err(|e| DomainError::ValidationFailed(e.to_string()))).transpose()
    }

    async fn list_for_project(&self, project_id: Uuid) -> DomainResult<Vec<Workflow>> {
        let rows: Vec<WorkflowRow> = sqlx::query_as("SELECT * FROM workflows WHERE project_id = ?")
            .bind(project_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|r| Workflow::try_from(r).map_err(|e| DomainError::ValidationFailed(e.to_string())))
            .collect()
    }

    async fn create_stage(&self, stage: &ScanStage) -> DomainResult<()> {
        let tool_params_json = serde_json::to_string(&stage.tool_params)?;
        let predecessors_json = serde_json::to_string(&stage.predecessors)?;
        let required_tags_json = serde_json::to_string(&stage.required_tags)?;
        let execution_policy = match stage.execution_policy {
            crate::domain::models::ExecutionPolicy::Sequential => "sequential",
            crate::domain::models::ExecutionPolicy::Parallel => "parallel",
        };

        sqlx::query(
            r#"INSERT INTO stages (id, workflow_id, tool_name, tool_params_json, predecessors_json,
               execution_policy, required_tags_json) VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(stage.id.to_string())
        .bind(stage.workflow_id.to_string())
        .bind(&stage.tool_name)
        .bind(&tool_params_json)
        .bind(&predecessors_json)
        .bind(execution_policy)
        .bind(&required_tags_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_stages(&self, workflow_id: Uuid) -> DomainResult<Vec<ScanStage>> {
        let rows: Vec<ScanStageRow> = sqlx::query_as("SELECT * FROM stages WHERE workflow_id = ?")
            .bind(workflow_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|r| ScanStage::try_from(r).map_err(|e| DomainError::ValidationFailed(e.to_string())))
            .collect()
    }
}
