//! StageResult: the wire-level envelope an Agent submits to the Master's
//! ingestion endpoint, before ETL turns it into typed assets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub task_id: Uuid,
    pub agent_id: String,
    pub result_type: String,
    pub target_value: String,
    pub attributes: Value,
    pub evidence: Value,
    pub produced_at: DateTime<Utc>,
}

impl StageResult {
    pub fn archive_key(&self) -> String {
        format!(
            "{}/{}/{}.json",
            self.task_id,
            self.result_type,
            self.produced_at.timestamp_nanos_opt().unwrap_or_default()
        )
    }
}
