//! Agent domain model: identity, hardware, capability vector, lifecycle.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a registered Agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Online,
    Offline,
    Error,
    Maintenance,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Error => "error",
            Self::Maintenance => "maintenance",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "online" => Some(Self::Online),
            "offline" => Some(Self::Offline),
            "error" => Some(Self::Error),
            "maintenance" => Some(Self::Maintenance),
            _ => None,
        }
    }
}

/// Static hardware facts reported at registration time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHardware {
    pub os: String,
    pub arch: String,
    pub cpu_cores: u32,
    pub mem_total: u64,
    pub disk_total: u64,
}

/// A scanning worker node known to the Master.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: String,
    pub hostname: String,
    pub ip: String,
    pub port: u16,
    pub hardware: AgentHardware,
    pub status: AgentStatus,
    pub last_heartbeat: DateTime<Utc>,
    /// Bearer token issued at registration, rotated on re-register.
    pub token: String,
    pub token_expiry: DateTime<Utc>,
    /// Scan types this agent can run (case-insensitive comparison at match time).
    pub task_support: HashSet<String>,
    pub tags: HashSet<String>,
}

impl Agent {
    /// Upsert key for registration: agents are identified by hostname+ip.
    pub fn upsert_key(hostname: &str, ip: &str) -> String {
        format!("{hostname}|{ip}")
    }

    /// An agent transitions to offline if no heartbeat was seen within
    /// `3 * heartbeat_interval` of `now` (§3 lifecycle rule).
    pub fn is_stale(&self, now: DateTime<Utc>, heartbeat_interval: chrono::Duration) -> bool {
        now.signed_duration_since(self.last_heartbeat) > heartbeat_interval * 3
    }

    /// Case-insensitive capability match against a tool name.
    pub fn supports(&self, tool_name: &str) -> bool {
        self.task_support
            .iter()
            .any(|t| t.eq_ignore_ascii_case(tool_name))
    }

    /// Whether this agent carries every tag in `required`.
    pub fn has_all_tags(&self, required: &HashSet<String>) -> bool {
        required.is_subset(&self.tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Agent {
        Agent {
            agent_id: "a1".into(),
            hostname: "h1".into(),
            ip: "10.0.0.1".into(),
            port: 9000,
            hardware: AgentHardware {
                os: "linux".into(),
                arch: "x86_64".into(),
                cpu_cores: 8,
                mem_total: 16_000_000_000,
                disk_total: 500_000_000_000,
            },
            status: AgentStatus::Online,
            last_heartbeat: Utc::now(),
            token: "tok".into(),
            token_expiry: Utc::now() + chrono::Duration::hours(1),
            task_support: ["alive", "port"].iter().map(|s| s.to_string()).collect(),
            tags: ["prod"].iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn capability_match_is_case_insensitive() {
        let a = sample();
        assert!(a.supports("PORT"));
        assert!(!a.supports("web"));
    }

    #[test]
    fn tag_subset_check() {
        let a = sample();
        let mut required = HashSet::new();
        required.insert("prod".to_string());
        assert!(a.has_all_tags(&required));
        required.insert("dmz".to_string());
        assert!(!a.has_all_tags(&required));
    }

    #[test]
    fn staleness_after_three_intervals() {
        let mut a = sample();
        a.last_heartbeat = Utc::now() - chrono::Duration::seconds(100);
        assert!(a.is_stale(Utc::now(), chrono::Duration::seconds(30)));
        assert!(!a.is_stale(Utc::now(), chrono::Duration::seconds(60)));
    }
}
