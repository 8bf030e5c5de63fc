//! Append-only Agent metrics time series, written once per heartbeat.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    Idle,
    Busy,
    Draining,
}

/// One heartbeat's worth of Agent telemetry.
///
/// `sequence` is a per-agent monotonically increasing counter (a detail
/// recovered from original_source, not present in the distilled spec): it
/// lets the repository dedupe a retried heartbeat POST against the same
/// sample without relying on `timestamp` equality, which can collide at
/// whole-second resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub agent_id: String,
    pub sequence: u64,
    pub cpu: f32,
    pub mem: f32,
    pub disk: f32,
    pub net_sent: u64,
    pub net_recv: u64,
    pub running_tasks: u32,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub work_status: WorkStatus,
    pub timestamp: DateTime<Utc>,
}
