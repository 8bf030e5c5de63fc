//! MasterClient: the Agent-side port for the Master-Agent protocol (§4.4, §6).
//! Production implementation is `adapters::http::agent_client::HttpMasterClient`;
//! tests use an in-memory fake.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::error::TaskError;
use crate::domain::models::{AgentHardware, AgentMetrics};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub hostname: String,
    pub ip_address: String,
    pub port: u16,
    pub version: String,
    pub hardware: AgentHardware,
    pub task_support: HashSet<String>,
    pub tags: HashSet<String>,
    pub token_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub agent_id: String,
    pub auth_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleVersions {
    pub fingerprint: String,
    pub poc: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTask {
    pub task_id: Uuid,
    pub project_id: Uuid,
    pub task_type: String,
    pub tool_name: String,
    pub tool_params: Value,
    pub input_target: Value,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: String,
    pub result: Option<String>,
    pub error_msg: Option<String>,
}

/// Errors the Agent<->Master RPC layer can hit; distinguished from
/// `TaskError` because they originate from the transport, not task logic.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum MasterClientError {
    #[error("network error: {0}")]
    Network(String),

    #[error("http {0}: {1}")]
    Http(u16, String),

    #[error(transparent)]
    Task(#[from] TaskError),
}

impl MasterClientError {
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Http(status, _) => *status == 503 || *status >= 500,
            Self::Task(_) => false,
        }
    }
}

#[async_trait]
pub trait MasterClient: Send + Sync {
    async fn register(&self, req: RegisterRequest) -> Result<RegisterResponse, MasterClientError>;

    async fn heartbeat(
        &self,
        agent_id: &str,
        status: &str,
        metrics: &AgentMetrics,
    ) -> Result<RuleVersions, MasterClientError>;

    async fn poll_tasks(&self, agent_id: &str) -> Result<Vec<WireTask>, MasterClientError>;

    async fn report_status(&self, task_id: Uuid, report: StatusReport) -> Result<(), MasterClientError>;
}

/// Extra metadata the Agent's dispatcher/translator promotes into the
/// domain `Task::params` map. Kept separate from `WireTask` because the
/// wire shape only needs `input_target`; `Params` is a post-translation view.
pub type Params = HashMap<String, Value>;
