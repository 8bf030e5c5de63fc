//! Port/service runner: TCP-connect port scan over the task's configured
//! port range, each port probed concurrently (bounded by the runner's own
//! `AdaptiveLimiter`) with service/version detection via the probe-match
//! engine.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::application::dialer::Dialer;
use crate::application::limiter::AdaptiveLimiter;
use crate::application::rtt::RttEstimator;
use crate::application::runner::{Runner, RunnerError};
use crate::application::scanners::service_probes::detect_service;
use crate::domain::models::{PortServiceResult, ResultData, ResultStatus, Task, TaskResult, TaskType};
use crate::services::target::parse_port_range;

/// Upper bound on futures driven concurrently by the stream combinator;
/// the `AdaptiveLimiter` is the real throttle, this just avoids building
/// an unbounded number of pending futures up front for huge port ranges.
const MAX_IN_FLIGHT: usize = 256;

pub struct PortServiceRunner {
    dialer: Arc<Dialer>,
    limiter: AdaptiveLimiter,
    rtt: Mutex<RttEstimator>,
}

impl PortServiceRunner {
    pub fn new(dialer: Arc<Dialer>) -> Self {
        Self { dialer, limiter: AdaptiveLimiter::new(50, 5, 200), rtt: Mutex::new(RttEstimator::new()) }
    }

    async fn probe_port(&self, ip: IpAddr, port: u16, service_detect: bool, cancel: &CancellationToken) -> Option<PortServiceResult> {
        let permit = self.limiter.acquire(cancel).await?;

        let started = Instant::now();
        let connected = self.dialer.connect_tcp((ip, port).into()).await.is_ok();
        if !connected {
            self.limiter.on_failure().await;
            self.limiter.release(permit).await;
            return None;
        }

        let read_timeout = {
            let mut guard = self.rtt.lock().await;
            guard.update(started.elapsed());
            guard.timeout().min(Duration::from_secs(2))
        };

        let result = if service_detect {
            match detect_service(&self.dialer, ip, port, read_timeout).await {
                Some(m) => PortServiceResult { ip, port, open: true, service: m.service, product: m.product, version: m.version, info: m.info, cpe: m.cpe },
                None => PortServiceResult { ip, port, open: true, service: "unknown".to_string(), product: None, version: None, info: None, cpe: None },
            }
        } else {
            PortServiceResult { ip, port, open: true, service: "unknown".to_string(), product: None, version: None, info: None, cpe: None }
        };

        self.limiter.on_success().await;
        self.limiter.release(permit).await;
        Some(result)
    }
}

#[async_trait]
impl Runner for PortServiceRunner {
    fn name(&self) -> TaskType {
        TaskType::Port
    }

    async fn run(&self, task: &Task, cancel: CancellationToken) -> Result<Vec<TaskResult>, RunnerError> {
        let ip: IpAddr = task
            .target
            .parse()
            .map_err(|_| RunnerError::Failed(format!("invalid target for port scan: {}", task.target)))?;

        let spec = task.port_range.as_deref().unwrap_or("top1000");
        let ports = parse_port_range(spec).map_err(|e| RunnerError::Failed(e.to_string()))?;
        let service_detect = task.param_bool("service_detect", true);

        let mut data: Vec<ResultData> = stream::iter(ports)
            .map(|port| self.probe_port(ip, port, service_detect, &cancel))
            .buffer_unordered(MAX_IN_FLIGHT)
            .filter_map(|outcome| async move { outcome.map(ResultData::PortService) })
            .collect()
            .await;

        if cancel.is_cancelled() {
            return Err(RunnerError::Cancelled);
        }

        data.sort_by_key(|d| match d {
            ResultData::PortService(r) => r.port,
            _ => 0,
        });

        let now = Utc::now();
        Ok(vec![TaskResult {
            task_id: task.id,
            status: ResultStatus::Completed,
            data,
            error: None,
            executed_at: now,
            completed_at: now,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_non_ip_target() {
        let runner = PortServiceRunner::new(Arc::new(Dialer::default()));
        let task = Task::new(TaskType::Port, "not-an-ip").with_port_range("22");
        let err = runner.run(&task, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, RunnerError::Failed(_)));
    }

    #[tokio::test]
    async fn closed_ports_produce_no_results() {
        let mut dialer = Dialer::default();
        dialer.connect_timeout = std::time::Duration::from_millis(200);
        let runner = PortServiceRunner::new(Arc::new(dialer));
        let task = Task::new(TaskType::Port, "192.0.2.1").with_port_range("22,80");
        let results = runner.run(&task, CancellationToken::new()).await.unwrap();
        assert!(results[0].data.is_empty());
    }
}
