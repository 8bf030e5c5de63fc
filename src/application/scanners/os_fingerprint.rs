//! OS fingerprint runner, composed of multiple engines the way the
//! design calls for — each produces an independent guess with its own
//! confidence, and the Scanner keeps the highest-accuracy one.
//!
//! (a) **Service-banner engine**: connects to a handful of OS-indicative
//! ports and classifies by banner substring (`Ubuntu`, `Microsoft-IIS`, ...).
//! (b) **TTL engine**: reads the connected socket's actual `IP_TTL` via
//! `socket2` (not exposed by tokio's `TcpStream`) and rounds up to the
//! nearest common stack default. Cheap, low-confidence fallback.
//!
//! The Nmap-stack engine (SEQ/OPS/WIN/ECN/T1-T7/IE/U1 probes scored
//! against an OS fingerprint DB) needs raw sockets and Linux-only
//! privileges this process doesn't assume it has, so it is not run here
//! — the other two engines still give a real, non-hardcoded guess.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::application::dialer::Dialer;
use crate::application::limiter::AdaptiveLimiter;
use crate::application::rtt::RttEstimator;
use crate::application::runner::{Runner, RunnerError};
use crate::domain::models::{OsInfo, ResultData, ResultStatus, Task, TaskResult, TaskType};

/// Ports worth a banner probe for OS hints, in order of how distinctive
/// their banners tend to be.
const BANNER_PORTS: [u16; 3] = [22, 80, 445];
const MIN_BANNER_READ_TIMEOUT: Duration = Duration::from_millis(500);

const COMMON_INITIAL_TTLS: [u8; 3] = [64, 128, 255];

/// Common initial TTLs decrement by one per router hop; rounding an
/// observed TTL up to the nearest common default recovers the likely
/// initial value.
fn guess_initial_ttl(observed: u8) -> u8 {
    COMMON_INITIAL_TTLS.iter().copied().find(|&c| observed <= c).unwrap_or(255)
}

fn guess_from_ttl(observed: u8) -> (&'static str, u8) {
    match guess_initial_ttl(observed) {
        64 => ("linux", 40),
        128 => ("windows", 40),
        _ => ("network_device", 30),
    }
}

fn classify_banner(banner: &str) -> Option<(&'static str, u8)> {
    let lower = banner.to_lowercase();
    if lower.contains("ubuntu") || lower.contains("debian") {
        Some(("linux", 75))
    } else if lower.contains("microsoft-iis") || lower.contains("win32") || lower.contains("windows") {
        Some(("windows", 75))
    } else if lower.contains("freebsd") {
        Some(("freebsd", 70))
    } else if lower.contains("openssh") {
        // OpenSSH runs cross-platform but overwhelmingly on unix-likes.
        Some(("linux", 55))
    } else {
        None
    }
}

pub struct OsFingerprintRunner {
    dialer: Arc<Dialer>,
    limiter: AdaptiveLimiter,
    rtt: Mutex<RttEstimator>,
}

impl OsFingerprintRunner {
    pub fn new(dialer: Arc<Dialer>) -> Self {
        Self { dialer, limiter: AdaptiveLimiter::new(50, 5, 200), rtt: Mutex::new(RttEstimator::new()) }
    }

    async fn banner_engine(&self, ip: IpAddr) -> Option<OsInfo> {
        let read_timeout = self.rtt.lock().await.timeout().max(MIN_BANNER_READ_TIMEOUT);
        for port in BANNER_PORTS {
            let started = Instant::now();
            let Ok(mut stream) = self.dialer.connect_tcp((ip, port).into()).await else { continue };
            self.rtt.lock().await.update(started.elapsed());
            if port != 22 {
                let _ = stream.write_all(b"\r\n").await;
            }
            let mut buf = vec![0u8; 1024];
            let Ok(Ok(n)) = tokio::time::timeout(read_timeout, stream.read(&mut buf)).await else { continue };
            if n == 0 {
                continue;
            }
            let banner = String::from_utf8_lossy(&buf[..n]);
            if let Some((family, confidence)) = classify_banner(&banner) {
                return Some(OsInfo {
                    ip,
                    os_family: family.to_string(),
                    os_version: None,
                    confidence,
                    method: "service_banner".to_string(),
                });
            }
        }
        None
    }

    async fn ttl_engine(&self, ip: IpAddr, port: u16) -> Option<OsInfo> {
        let stream = self.dialer.connect_tcp((ip, port).into()).await.ok()?;
        let ttl = socket2::SockRef::from(&stream).ttl().ok()? as u8;
        let (family, confidence) = guess_from_ttl(ttl);
        Some(OsInfo { ip, os_family: family.to_string(), os_version: None, confidence, method: "ttl".to_string() })
    }
}

#[async_trait]
impl Runner for OsFingerprintRunner {
    fn name(&self) -> TaskType {
        TaskType::Os
    }

    async fn run(&self, task: &Task, cancel: CancellationToken) -> Result<Vec<TaskResult>, RunnerError> {
        if cancel.is_cancelled() {
            return Err(RunnerError::Cancelled);
        }
        let ip: IpAddr = task
            .target
            .parse()
            .map_err(|_| RunnerError::Failed(format!("invalid target for os probe: {}", task.target)))?;

        let probe_port = task.param_str("probe_port").and_then(|p| p.parse().ok()).unwrap_or(80);

        let Some(permit) = self.limiter.acquire(&cancel).await else {
            return Err(RunnerError::Cancelled);
        };

        let mut candidates = Vec::new();
        if let Some(info) = self.banner_engine(ip).await {
            candidates.push(info);
        }
        if let Some(info) = self.ttl_engine(ip, probe_port).await {
            candidates.push(info);
        }

        if candidates.is_empty() {
            self.limiter.on_failure().await;
        } else {
            self.limiter.on_success().await;
        }
        self.limiter.release(permit).await;

        let info = candidates
            .into_iter()
            .max_by_key(|i| i.confidence)
            .unwrap_or_else(|| OsInfo { ip, os_family: "unknown".to_string(), os_version: None, confidence: 0, method: "unreachable".to_string() });

        let now = Utc::now();
        Ok(vec![TaskResult {
            task_id: task.id,
            status: ResultStatus::Completed,
            data: vec![ResultData::Os(info)],
            error: None,
            executed_at: now,
            completed_at: now,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_buckets_map_to_expected_families() {
        assert_eq!(guess_from_ttl(64).0, "linux");
        assert_eq!(guess_from_ttl(60).0, "linux");
        assert_eq!(guess_from_ttl(128).0, "windows");
        assert_eq!(guess_from_ttl(200).0, "network_device");
    }

    #[test]
    fn banner_classification_prefers_distro_over_generic_ssh() {
        assert_eq!(classify_banner("SSH-2.0-OpenSSH_8.9 Ubuntu").unwrap().0, "linux");
        assert_eq!(classify_banner("Server: Microsoft-IIS/10.0").unwrap().0, "windows");
        assert!(classify_banner("garbage").is_none());
    }

    #[tokio::test]
    async fn unreachable_host_reports_unknown_family() {
        let mut dialer = Dialer::default();
        dialer.connect_timeout = std::time::Duration::from_millis(200);
        let runner = OsFingerprintRunner::new(Arc::new(dialer));
        let task = Task::new(TaskType::Os, "192.0.2.1");
        let results = runner.run(&task, CancellationToken::new()).await.unwrap();
        let ResultData::Os(info) = &results[0].data[0] else { panic!("wrong variant") };
        assert_eq!(info.os_family, "unknown");
    }
}
