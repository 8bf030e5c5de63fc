//! ETLError: a persisted record of a failed result ingestion, eligible for replay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EtlErrorStatus {
    New,
    Retrying,
    Fixed,
    Ignored,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlErrorRecord {
    pub id: Uuid,
    pub project_id: Option<Uuid>,
    pub task_id: Uuid,
    pub result_type: String,
    pub raw_data: Value,
    pub error_msg: String,
    pub error_stage: String,
    pub status: EtlErrorStatus,
    pub created_at: DateTime<Utc>,
}

impl EtlErrorRecord {
    pub fn new(
        task_id: Uuid,
        project_id: Option<Uuid>,
        result_type: impl Into<String>,
        raw_data: Value,
        error_msg: impl Into<String>,
        error_stage: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            task_id,
            result_type: result_type.into(),
            raw_data,
            error_msg: error_msg.into(),
            error_stage: error_stage.into(),
            status: EtlErrorStatus::New,
            created_at: Utc::now(),
        }
    }

    /// Replay flips `new -> retrying`; only `new` rows are eligible.
    pub fn mark_retrying(&mut self) -> Result<(), String> {
        if self.status != EtlErrorStatus::New {
            return Err(format!("cannot replay a row in status {:?}", self.status));
        }
        self.status = EtlErrorStatus::Retrying;
        Ok(())
    }
}
