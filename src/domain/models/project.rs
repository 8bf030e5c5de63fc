//! Project: holds target scope and scan policy for a Workflow run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Draft,
    Running,
    Paused,
    Completed,
    Cancelled,
}

/// Where a Project's target scope comes from — see `TargetProvider`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetSource {
    Manual { targets: Vec<String> },
    ProjectTarget { seed: String },
    File { path: String, format: FileFormat },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    Line,
    Csv,
    JsonArray,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub target_source: TargetSource,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: impl Into<String>, target_source: TargetSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            target_source,
            status: ProjectStatus::Draft,
            created_at: Utc::now(),
        }
    }
}
