//! `server`: runs as a cluster worker — registers with the Master, then
//! loops heartbeat/poll/execute/report until interrupted.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::adapters::http::HttpMasterClient;
use crate::application::agent_engine::worker_pool::TaskQueue;
use crate::application::agent_engine::{AgentClient, Reporter, WorkerPool};
use crate::application::dialer::Dialer;
use crate::application::limiter::AdaptiveLimiter;
use crate::application::runner::RunnerManager;
use crate::application::scanners::{
    alive::AliveRunner, brute::BruteRunner, os_fingerprint::OsFingerprintRunner,
    port_service::PortServiceRunner, web::WebRunner,
};
use crate::domain::models::{AgentHardware, AgentMetrics, WorkStatus};
use crate::domain::ports::{MasterClient, NullDnsResolver, RegisterRequest};
use crate::infrastructure::config::AgentConfig;

fn local_hardware() -> AgentHardware {
    AgentHardware {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        cpu_cores: std::thread::available_parallelism().map(|n| n.get() as u32).unwrap_or(1),
        mem_total: 0,
        disk_total: 0,
    }
}

fn local_hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown-host".to_string())
}

fn local_ip() -> String {
    std::env::var("NEOSCAN_AGENT_IP").unwrap_or_else(|_| "127.0.0.1".to_string())
}

pub async fn handle(config: AgentConfig) -> Result<()> {
    let master = Arc::new(
        HttpMasterClient::new(config.master_url.clone())
            .with_auth_token(config.auth_token.clone())
            .with_retry_policy(10, std::time::Duration::from_secs(5)),
    );

    let register_request = RegisterRequest {
        hostname: local_hostname(),
        ip_address: local_ip(),
        port: config.listen_port,
        version: env!("CARGO_PKG_VERSION").to_string(),
        hardware: local_hardware(),
        task_support: ["alive", "port", "os", "brute", "web"].iter().map(|s| s.to_string()).collect(),
        tags: HashSet::new(),
        token_secret: config.auth_token.clone(),
    };

    let registered = master.register(register_request).await.context("agent registration failed")?;
    info!(agent_id = %registered.agent_id, "registered with master");
    master.set_auth_token(registered.auth_token.clone());

    let dialer = Arc::new(Dialer::default());
    let runners = Arc::new(RunnerManager::new());
    runners.register(Arc::new(AliveRunner::new(dialer.clone(), Arc::new(NullDnsResolver)))).await;
    runners.register(Arc::new(PortServiceRunner::new(dialer.clone()))).await;
    runners.register(Arc::new(OsFingerprintRunner::new(dialer.clone()))).await;
    runners.register(Arc::new(BruteRunner::new(dialer))).await;
    runners.register(Arc::new(WebRunner::new())).await;

    let limiter = Arc::new(AdaptiveLimiter::new(
        config.max_concurrent_tasks as u32,
        1,
        config.max_concurrent_tasks as u32 * 4,
    ));
    let reporter = Arc::new(Reporter::new(master.clone() as Arc<dyn MasterClient>));
    let (task_tx, task_queue) = TaskQueue::channel(config.max_concurrent_tasks * 4);
    let pool = Arc::new(WorkerPool::new(task_queue, runners, limiter, reporter));

    let cancel = CancellationToken::new();
    let mut worker_set = pool.spawn(config.max_concurrent_tasks, cancel.clone());

    let client = AgentClient::new(master, config.heartbeat_interval(), config.task_poll_interval());
    let agent_id = registered.agent_id.clone();
    let metrics_source: Arc<dyn Fn() -> AgentMetrics + Send + Sync> = Arc::new(move || AgentMetrics {
        agent_id: agent_id.clone(),
        sequence: 0,
        cpu: 0.0,
        mem: 0.0,
        disk: 0.0,
        net_sent: 0,
        net_recv: 0,
        running_tasks: 0,
        completed_tasks: 0,
        failed_tasks: 0,
        work_status: WorkStatus::Idle,
        timestamp: chrono::Utc::now(),
    });

    let poll_cancel = cancel.clone();
    let (tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = tx.send(()).await;
    });

    tokio::select! {
        _ = client.run(registered.agent_id, metrics_source, task_tx, poll_cancel) => {}
        _ = shutdown_rx.recv() => {
            info!("shutdown signal received, draining workers");
            cancel.cancel();
        }
    }

    while worker_set.join_next().await.is_some() {}
    Ok(())
}
