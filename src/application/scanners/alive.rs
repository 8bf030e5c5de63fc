//! Alive runner: TCP-connect liveness probe with RTT measurement and
//! optional reverse-DNS hostname resolution. Holds its own
//! `AdaptiveLimiter`/`RttEstimator` pair so a burst of concurrently
//! dispatched alive tasks on one agent doesn't storm the network any
//! harder than the port/service runner does.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::application::dialer::Dialer;
use crate::application::limiter::AdaptiveLimiter;
use crate::application::rtt::RttEstimator;
use crate::application::runner::{Runner, RunnerError};
use crate::domain::models::{IpAliveResult, ResultData, ResultStatus, Task, TaskResult, TaskType};
use crate::domain::ports::DnsResolver;

/// Ports probed for a TCP-connect liveness check when the caller hasn't
/// requested a specific one via `task.port_range`. 443 and 80 cover most
/// hosts with a firewall that drops ICMP but still serves HTTP(S).
const PROBE_PORTS: [u16; 3] = [443, 80, 22];

pub struct AliveRunner {
    dialer: Arc<Dialer>,
    resolver: Arc<dyn DnsResolver>,
    limiter: AdaptiveLimiter,
    rtt: Mutex<RttEstimator>,
}

impl AliveRunner {
    pub fn new(dialer: Arc<Dialer>, resolver: Arc<dyn DnsResolver>) -> Self {
        Self { dialer, resolver, limiter: AdaptiveLimiter::new(50, 5, 200), rtt: Mutex::new(RttEstimator::new()) }
    }
}

#[async_trait]
impl Runner for AliveRunner {
    fn name(&self) -> TaskType {
        TaskType::Alive
    }

    async fn run(&self, task: &Task, cancel: CancellationToken) -> Result<Vec<TaskResult>, RunnerError> {
        let ip: IpAddr = task
            .target
            .parse()
            .map_err(|_| RunnerError::Failed(format!("invalid target for alive probe: {}", task.target)))?;

        let Some(permit) = self.limiter.acquire(&cancel).await else {
            return Err(RunnerError::Cancelled);
        };

        let mut alive = false;
        let mut rtt_ms = None;
        for port in PROBE_PORTS {
            if cancel.is_cancelled() {
                self.limiter.release(permit).await;
                return Err(RunnerError::Cancelled);
            }
            let started = Instant::now();
            if self.dialer.connect_tcp((ip, port).into()).await.is_ok() {
                let elapsed = started.elapsed();
                self.rtt.lock().await.update(elapsed);
                alive = true;
                rtt_ms = Some(elapsed.as_secs_f64() * 1000.0);
                break;
            }
        }

        if alive {
            self.limiter.on_success().await;
        } else {
            self.limiter.on_failure().await;
        }
        self.limiter.release(permit).await;

        let hostname = if alive { self.resolver.resolve(ip).await } else { None };

        let result = IpAliveResult { ip, alive, rtt_ms, ttl: None, os_guess: None, hostname };
        let now = Utc::now();
        Ok(vec![TaskResult {
            task_id: task.id,
            status: ResultStatus::Completed,
            data: vec![ResultData::IpAlive(result)],
            error: None,
            executed_at: now,
            completed_at: now,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::NullDnsResolver;

    #[tokio::test]
    async fn rejects_non_ip_target() {
        let runner = AliveRunner::new(Arc::new(Dialer::default()), Arc::new(NullDnsResolver));
        let task = Task::new(TaskType::Alive, "not-an-ip");
        let err = runner.run(&task, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, RunnerError::Failed(_)));
    }

    #[tokio::test]
    async fn unreachable_host_reports_not_alive() {
        let mut dialer = Dialer::default();
        dialer.connect_timeout = std::time::Duration::from_millis(200);
        let runner = AliveRunner::new(Arc::new(dialer), Arc::new(NullDnsResolver));
        let task = Task::new(TaskType::Alive, "192.0.2.1");
        let results = runner.run(&task, CancellationToken::new()).await.unwrap();
        let ResultData::IpAlive(r) = &results[0].data[0] else { panic!("wrong variant") };
        assert!(!r.alive);
    }

    #[tokio::test]
    async fn cancellation_before_probe_yields_cancelled_error() {
        let runner = AliveRunner::new(Arc::new(Dialer::default()), Arc::new(NullDnsResolver));
        let task = Task::new(TaskType::Alive, "192.0.2.1");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = runner.run(&task, cancel).await.unwrap_err();
        assert!(matches!(err, RunnerError::Cancelled));
    }
}
