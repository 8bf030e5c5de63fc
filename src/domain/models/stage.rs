//! ScanStage: one node of a Workflow's stage DAG.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPolicy {
    /// Run as soon as all predecessors complete.
    Sequential,
    /// Run concurrently with any sibling stage whose predecessors are also met.
    Parallel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanStage {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub tool_name: String,
    pub tool_params: Value,
    pub predecessors: Vec<Uuid>,
    pub execution_policy: ExecutionPolicy,
    pub required_tags: HashSet<String>,
}

impl ScanStage {
    pub fn new(workflow_id: Uuid, tool_name: impl Into<String>, tool_params: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            tool_name: tool_name.into(),
            tool_params,
            predecessors: Vec::new(),
            execution_policy: ExecutionPolicy::Parallel,
            required_tags: HashSet::new(),
        }
    }

    pub fn with_predecessors(mut self, predecessors: Vec<Uuid>) -> Self {
        self.predecessors = predecessors;
        self
    }

    pub fn with_required_tags(mut self, tags: HashSet<String>) -> Self {
        self.required_tags = tags;
        self
    }
}
