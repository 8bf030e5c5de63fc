//! Reporter: posts a Runner's outcome back to the Master over the
//! `MasterClient` port (HTTP in production, an in-memory fake in tests).

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::models::{ResultStatus, TaskResult};
use crate::domain::ports::{MasterClient, MasterClientError, StatusReport};

pub struct Reporter {
    client: Arc<dyn MasterClient>,
}

impl Reporter {
    pub fn new(client: Arc<dyn MasterClient>) -> Self {
        Self { client }
    }

    pub async fn report(&self, task_id: Uuid, result: TaskResult) -> Result<(), MasterClientError> {
        let status = match result.status {
            ResultStatus::Completed => "completed",
            ResultStatus::Failed => "failed",
        };
        let error_msg = result.error.clone();
        let payload = serde_json::to_string(&result).unwrap_or_else(|_| "{}".to_string());
        self.client
            .report_status(task_id, StatusReport { status: status.to_string(), result: Some(payload), error_msg })
            .await
    }

    pub async fn report_failure(&self, task_id: Uuid, error_msg: String) -> Result<(), MasterClientError> {
        self.client
            .report_status(task_id, StatusReport { status: "failed".to_string(), result: None, error_msg: Some(error_msg) })
            .await
    }
}
