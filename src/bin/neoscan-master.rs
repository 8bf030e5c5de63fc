//! `neoscan-master` entrypoint: loads config, migrates the database,
//! wires the HTTP API, and spawns the background dispatch and ETL loops.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use neoscan::adapters::http::auth::AuthState;
use neoscan::adapters::http::master_api::{self, MasterApiState};
use neoscan::adapters::sqlite::{
    create_pool, migrate, PoolConfig, SqliteAgentRepository, SqliteAssetRepository,
    SqliteEtlErrorRepository, SqliteProjectRepository, SqliteTagRepository, SqliteTaskRepository,
    SqliteWorkflowRepository,
};
use neoscan::domain::models::AgentTaskStatus;
use neoscan::domain::ports::{
    AgentRepository, AgentTaskFilter, NullFingerprintService, RuleVersions, TaskRepository,
};
use neoscan::infrastructure::{config::ConfigLoader, logging};
use neoscan::services::dispatcher::{allocate, DispatchGate};
use neoscan::services::etl::EtlProcessor;
use neoscan::services::ingestor::ResultQueue;

const EXIT_OK: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_CONFIG_ERROR: i32 = 2;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(()) => std::process::exit(EXIT_OK),
        Err(e) if e.downcast_ref::<ConfigLoadError>().is_some() => {
            eprintln!("configuration error: {e:#}");
            std::process::exit(EXIT_CONFIG_ERROR);
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(EXIT_ERROR);
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct ConfigLoadError(String);

async fn run() -> Result<()> {
    let config = ConfigLoader::load().map_err(|e| ConfigLoadError(e.to_string()))?;
    let _logger_guard = logging::init(&config.logging).map_err(|e| ConfigLoadError(e.to_string()))?;

    let pool = create_pool(
        &format!("sqlite://{}", config.database.path),
        Some(PoolConfig { max_connections: config.database.max_connections, ..Default::default() }),
    )
    .await
    .context("failed to create sqlite pool")?;
    migrate(&pool).await.context("failed to run migrations")?;

    let agents: Arc<dyn AgentRepository> = Arc::new(SqliteAgentRepository::new(pool.clone()));
    let tasks: Arc<dyn TaskRepository> = Arc::new(SqliteTaskRepository::new(pool.clone()));
    let projects = Arc::new(SqliteProjectRepository::new(pool.clone()));
    let workflows = Arc::new(SqliteWorkflowRepository::new(pool.clone()));
    let tags_repo = Arc::new(SqliteTagRepository::new(pool.clone()));
    let assets = Arc::new(SqliteAssetRepository::new(pool.clone()));
    let etl_errors = Arc::new(SqliteEtlErrorRepository::new(pool.clone()));
    let result_queue = Arc::new(ResultQueue::new(1024));
    let rule_versions = Arc::new(RwLock::new(RuleVersions { fingerprint: String::new(), poc: String::new() }));

    let etl_processor = Arc::new(EtlProcessor::new(
        result_queue.clone(),
        assets.clone(),
        tags_repo.clone(),
        etl_errors.clone(),
        Arc::new(NullFingerprintService),
    ));
    let _etl_workers = etl_processor.spawn_workers(4);

    let state = MasterApiState {
        agents: agents.clone(),
        tasks: tasks.clone(),
        projects,
        workflows,
        tags: tags_repo.clone(),
        assets,
        etl_errors,
        result_queue,
        rule_versions,
    };
    let auth = AuthState::new(config.master.auth_token.clone(), &config.master.ip_whitelist, agents.clone());
    let app = master_api::router(state, auth);

    let dispatch_gate = Arc::new(DispatchGate::new(Duration::from_millis(config.dispatch.min_interval_ms)));
    let dispatch_agents = agents.clone();
    let dispatch_tasks = tasks;
    let dispatch_tags = tags_repo;
    let _dispatch_loop = tokio::spawn(run_dispatch_loop(dispatch_agents, dispatch_tasks, dispatch_tags, dispatch_gate));

    let heartbeat_interval = chrono::Duration::seconds(config.agent.heartbeat_interval_secs as i64);
    let _staleness_loop = tokio::spawn(run_staleness_sweep(agents, heartbeat_interval));

    let addr: SocketAddr = config.master.bind_addr.parse().context("invalid master.bind_addr")?;
    let listener = tokio::net::TcpListener::bind(addr).await.context("failed to bind master.bind_addr")?;
    info!(%addr, "neoscan-master listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("http server error")?;

    Ok(())
}

/// Polls pending tasks and tries to allocate each to an online, capable
/// agent. A task with no eligible candidate is left pending and retried
/// next tick rather than failed outright.
async fn run_dispatch_loop(
    agents: Arc<dyn AgentRepository>,
    tasks: Arc<dyn TaskRepository>,
    tag_repo: Arc<dyn neoscan::domain::ports::TagRepository>,
    gate: Arc<DispatchGate>,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(2));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let pending = match tasks.list(AgentTaskFilter { status: Some(AgentTaskStatus::Pending), project_id: None, agent_id: None }).await {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "dispatch loop: failed to list pending tasks");
                continue;
            }
        };
        if pending.is_empty() {
            continue;
        }

        let candidates = match agents.list_online().await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "dispatch loop: failed to list online agents");
                continue;
            }
        };

        for mut task in pending {
            match allocate(&task, &candidates, tag_repo.as_ref(), &gate).await {
                Ok(agent) => {
                    if let Err(e) = task.assign(&agent.agent_id) {
                        warn!(task_id = %task.task_id, error = %e, "dispatch loop: assign rejected by state machine");
                        continue;
                    }
                    if let Err(e) = tasks.update(&task).await {
                        error!(task_id = %task.task_id, error = %e, "dispatch loop: failed to persist assignment");
                    }
                }
                Err(_) => continue,
            }
        }
    }
}

/// Sweeps for agents that have missed `3 * heartbeat_interval` and marks
/// them offline so the dispatch loop stops assigning them tasks.
async fn run_staleness_sweep(agents: Arc<dyn AgentRepository>, heartbeat_interval: chrono::Duration) {
    let mut ticker = tokio::time::interval(Duration::from_secs(30));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let online = match agents.list_online().await {
            Ok(a) => a,
            Err(e) => {
                warn!(error = %e, "staleness sweep: failed to list online agents");
                continue;
            }
        };

        let now = chrono::Utc::now();
        for agent in online {
            if agent.is_stale(now, heartbeat_interval) {
                if let Err(e) = agents.update_status(&agent.agent_id, neoscan::domain::models::AgentStatus::Offline).await {
                    error!(agent_id = %agent.agent_id, error = %e, "staleness sweep: failed to mark agent offline");
                } else {
                    info!(agent_id = %agent.agent_id, "agent marked offline after missed heartbeats");
                }
            }
        }
    }
}

