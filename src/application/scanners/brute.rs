//! Brute-force runner: a thin `Attempt` trait per protocol plus a small
//! built-in registry. Only a raw-banner-based FTP cracker is wired in
//! here as an illustrative implementation — SSH/RDP/SMB crackers need
//! real protocol handshakes (`russh`, NTLM, etc.) that are out of scope
//! for this pass.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::application::dialer::Dialer;
use crate::application::limiter::AdaptiveLimiter;
use crate::application::rtt::RttEstimator;
use crate::application::runner::{Runner, RunnerError};
use crate::domain::models::{BruteResult, ResultData, ResultStatus, Task, TaskResult, TaskType};

/// One protocol-specific credential-attempt strategy.
#[async_trait]
pub trait Attempt: Send + Sync {
    fn protocol(&self) -> &'static str;
    async fn try_login(&self, dialer: &Dialer, ip: IpAddr, port: u16, user: &str, pass: &str) -> bool;
}

/// Plaintext FTP `USER`/`PASS` attempt over the control channel.
pub struct FtpAttempt;

#[async_trait]
impl Attempt for FtpAttempt {
    fn protocol(&self) -> &'static str {
        "ftp"
    }

    async fn try_login(&self, dialer: &Dialer, ip: IpAddr, port: u16, user: &str, pass: &str) -> bool {
        let Ok(mut stream) = dialer.connect_tcp((ip, port).into()).await else { return false };
        let mut buf = [0u8; 512];

        // Drain the banner before sending USER, or the server may queue both commands.
        let _ = tokio::time::timeout(std::time::Duration::from_millis(500), stream.read(&mut buf)).await;

        if stream.write_all(format!("USER {user}\r\n").as_bytes()).await.is_err() {
            return false;
        }
        let _ = tokio::time::timeout(std::time::Duration::from_millis(500), stream.read(&mut buf)).await;

        if stream.write_all(format!("PASS {pass}\r\n").as_bytes()).await.is_err() {
            return false;
        }
        let Ok(Ok(n)) = tokio::time::timeout(std::time::Duration::from_millis(500), stream.read(&mut buf)).await else {
            return false;
        };
        String::from_utf8_lossy(&buf[..n]).trim_start().starts_with("230")
    }
}

pub struct BruteRunner {
    dialer: Arc<Dialer>,
    attempts: Vec<Arc<dyn Attempt>>,
    limiter: AdaptiveLimiter,
    rtt: Mutex<RttEstimator>,
}

impl BruteRunner {
    pub fn new(dialer: Arc<Dialer>) -> Self {
        Self {
            dialer,
            attempts: vec![Arc::new(FtpAttempt)],
            // Credential attempts are the noisiest, most lockout-prone probe
            // this agent runs; keep the ceiling far below the port scanner's.
            limiter: AdaptiveLimiter::new(10, 1, 20),
            rtt: Mutex::new(RttEstimator::new()),
        }
    }

    fn attempt_for(&self, protocol: &str) -> Option<&Arc<dyn Attempt>> {
        self.attempts.iter().find(|a| a.protocol() == protocol)
    }
}

#[async_trait]
impl Runner for BruteRunner {
    fn name(&self) -> TaskType {
        TaskType::Brute
    }

    async fn run(&self, task: &Task, cancel: CancellationToken) -> Result<Vec<TaskResult>, RunnerError> {
        let ip: IpAddr = task
            .target
            .parse()
            .map_err(|_| RunnerError::Failed(format!("invalid target for brute attempt: {}", task.target)))?;

        let protocol = task.param_str("protocol").unwrap_or("ftp");
        let port = task.param_str("port").and_then(|p| p.parse().ok()).unwrap_or(21);
        let attempt = self.attempt_for(protocol).ok_or_else(|| RunnerError::Failed(format!("unsupported brute protocol: {protocol}")))?;

        let credentials: Vec<(String, String)> = task
            .params
            .get("credentials")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|c| {
                        let user = c.get("username")?.as_str()?.to_string();
                        let pass = c.get("password")?.as_str()?.to_string();
                        Some((user, pass))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let Some(permit) = self.limiter.acquire(&cancel).await else {
            return Err(RunnerError::Cancelled);
        };

        let mut data = Vec::new();
        for (user, pass) in credentials {
            if cancel.is_cancelled() {
                self.limiter.release(permit).await;
                return Err(RunnerError::Cancelled);
            }
            let started = Instant::now();
            let success = attempt.try_login(&self.dialer, ip, port, &user, &pass).await;
            self.rtt.lock().await.update(started.elapsed());
            if success {
                self.limiter.on_success().await;
            } else {
                self.limiter.on_failure().await;
            }
            data.push(ResultData::Brute(BruteResult {
                ip,
                port,
                protocol: protocol.to_string(),
                username: user,
                password: pass,
                success,
            }));
            if success {
                break;
            }
        }
        self.limiter.release(permit).await;

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
    async fn unsupported_protocol_errors() {
        let runner = BruteRunner::new(Arc::new(Dialer::default()));
        let task = Task::new(TaskType::Brute, "10.0.0.1").with_param("protocol", serde_json::json!("rdp"));
        let err = runner.run(&task, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, RunnerError::Failed(_)));
    }

    #[tokio::test]
    async fn unreachable_host_reports_failed_attempts_not_error() {
        let mut dialer = Dialer::default();
        dialer.connect_timeout = std::time::Duration::from_millis(200);
        let runner = BruteRunner::new(Arc::new(dialer));
        let creds = serde_json::json!([{"username": "admin", "password": "admin"}]);
        let task = Task::new(TaskType::Brute, "192.0.2.1").with_param("credentials", creds);
        let results = runner.run(&task, CancellationToken::new()).await.unwrap();
        let ResultData::Brute(r) = &results[0].data[0] else { panic!("wrong variant") };
        assert!(!r.success);
    }
}
