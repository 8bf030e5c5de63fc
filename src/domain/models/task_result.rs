//! TaskResult and the typed result kinds scanners produce, each with a
//! tabular projection (headers + rows) for console/CSV rendering via
//! `cli::display::table`.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Produces a tabular projection of a result for console/CSV rendering.
pub trait TabularProjection {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpAliveResult {
    pub ip: IpAddr,
    pub alive: bool,
    pub rtt_ms: Option<f64>,
    pub ttl: Option<u8>,
    pub os_guess: Option<String>,
    pub hostname: Option<String>,
}

impl TabularProjection for IpAliveResult {
    fn headers() -> Vec<&'static str> {
        vec!["ip", "alive", "rtt_ms", "ttl", "os_guess", "hostname"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.ip.to_string(),
            self.alive.to_string(),
            self.rtt_ms.map(|v| format!("{v:.1}")).unwrap_or_default(),
            self.ttl.map(|v| v.to_string()).unwrap_or_default(),
            self.os_guess.clone().unwrap_or_default(),
            self.hostname.clone().unwrap_or_default(),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortServiceResult {
    pub ip: IpAddr,
    pub port: u16,
    pub open: bool,
    pub service: String,
    pub product: Option<String>,
    pub version: Option<String>,
    pub info: Option<String>,
    pub cpe: Option<String>,
}

impl TabularProjection for PortServiceResult {
    fn headers() -> Vec<&'static str> {
        vec!["ip", "port", "open", "service", "product", "version", "cpe"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.ip.to_string(),
            self.port.to_string(),
            self.open.to_string(),
            self.service.clone(),
            self.product.clone().unwrap_or_default(),
            self.version.clone().unwrap_or_default(),
            self.cpe.clone().unwrap_or_default(),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsInfo {
    pub ip: IpAddr,
    pub os_family: String,
    pub os_version: Option<String>,
    pub confidence: u8,
    pub method: String,
}

impl TabularProjection for OsInfo {
    fn headers() -> Vec<&'static str> {
        vec!["ip", "os_family", "os_version", "confidence", "method"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.ip.to_string(),
            self.os_family.clone(),
            self.os_version.clone().unwrap_or_default(),
            self.confidence.to_string(),
            self.method.clone(),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebResult {
    pub url: String,
    pub status_code: Option<u16>,
    pub title: Option<String>,
    pub fingerprints: Vec<String>,
    pub screenshot_base64: Option<String>,
    pub favicon_base64: Option<String>,
}

impl TabularProjection for WebResult {
    fn headers() -> Vec<&'static str> {
        vec!["url", "status_code", "title", "fingerprints"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.url.clone(),
            self.status_code.map(|v| v.to_string()).unwrap_or_default(),
            self.title.clone().unwrap_or_default(),
            self.fingerprints.join(","),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VulnResult {
    pub target: String,
    pub vuln_id: String,
    pub severity: String,
    pub evidence: String,
}

impl TabularProjection for VulnResult {
    fn headers() -> Vec<&'static str> {
        vec!["target", "vuln_id", "severity"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.target.clone(), self.vuln_id.clone(), self.severity.clone()]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BruteResult {
    pub ip: IpAddr,
    pub port: u16,
    pub protocol: String,
    pub username: String,
    pub password: String,
    pub success: bool,
}

impl TabularProjection for BruteResult {
    fn headers() -> Vec<&'static str> {
        vec!["ip", "port", "protocol", "username", "password", "success"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.ip.to_string(),
            self.port.to_string(),
            self.protocol.clone(),
            self.username.clone(),
            self.password.clone(),
            self.success.to_string(),
        ]
    }
}

/// The typed union of data a `TaskResult` can carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultData {
    IpAlive(IpAliveResult),
    PortService(PortServiceResult),
    Os(OsInfo),
    Web(WebResult),
    Vuln(VulnResult),
    Brute(BruteResult),
}

impl ResultData {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::IpAlive(_) => "ip_alive",
            Self::PortService(_) => "port_service",
            Self::Os(_) => "os",
            Self::Web(_) => "web",
            Self::Vuln(_) => "vuln",
            Self::Brute(_) => "brute",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: Uuid,
    pub status: ResultStatus,
    pub data: Vec<ResultData>,
    pub error: Option<String>,
    pub executed_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_data_kind_matches_variant() {
        let d = ResultData::PortService(PortServiceResult {
            ip: "127.0.0.1".parse().unwrap(),
            port: 22,
            open: true,
            service: "ssh".into(),
            product: None,
            version: None,
            info: None,
            cpe: None,
        });
        assert_eq!(d.kind(), "port_service");
    }

    #[test]
    fn tabular_projection_row_matches_header_len() {
        let r = IpAliveResult {
            ip: "10.0.0.1".parse().unwrap(),
            alive: true,
            rtt_ms: Some(1.23),
            ttl: Some(64),
            os_guess: Some("linux".into()),
            hostname: None,
        };
        assert_eq!(r.row().len(), IpAliveResult::headers().len());
    }
}
