//! Result Ingestor: bounded queue, validator, and archiver (§4.6). The
//! queue is the single backpressure point decoupling Agent submission
//! rate from ETL processing rate.

use tokio::sync::mpsc;
use tracing::warn;

use crate::domain::error::IngestError;
use crate::domain::models::{AgentTask, AgentTaskStatus, StageResult};
use crate::domain::ports::{Archiver, TaskRepository};

/// Bounded MPSC queue. `push` never blocks: a full queue maps to
/// `IngestError::Busy`, which the HTTP layer turns into 503.
pub struct ResultQueue {
    tx: mpsc::Sender<StageResult>,
    rx: tokio::sync::Mutex<mpsc::Receiver<StageResult>>,
}

impl ResultQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    pub fn push(&self, result: StageResult) -> Result<(), IngestError> {
        self.tx.try_send(result).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => IngestError::Busy,
            mpsc::error::TrySendError::Closed(_) => IngestError::Busy,
        })
    }

    pub async fn pop(&self) -> Option<StageResult> {
        self.rx.lock().await.recv().await
    }
}

/// Validates a submitted `StageResult` against the task it claims to
/// belong to: non-empty identifiers, ownership (anti-spoofing), and a
/// task status that can still receive results.
pub async fn validate(
    result: &StageResult,
    task_repo: &dyn TaskRepository,
) -> Result<AgentTask, IngestError> {
    if result.task_id.is_nil() || result.agent_id.is_empty() || result.result_type.is_empty() {
        return Err(IngestError::ValidationFailed("missing required field".into()));
    }

    let task = task_repo
        .get(result.task_id)
        .await
        .map_err(|e| IngestError::ValidationFailed(e.to_string()))?
        .ok_or_else(|| IngestError::ValidationFailed("task not found".into()))?;

    if task.agent_id.as_deref() != Some(result.agent_id.as_str()) {
        return Err(IngestError::ValidationFailed(
            "submitting agent does not own this task".into(),
        ));
    }

    if !matches!(task.status, AgentTaskStatus::Running | AgentTaskStatus::Assigned) {
        return Err(IngestError::ValidationFailed(format!(
            "task status {:?} cannot accept results",
            task.status
        )));
    }

    Ok(task)
}

/// Submits one result: validate, archive (best-effort), enqueue.
/// Archive failure never blocks queueing (at-least-once semantics).
pub async fn submit(
    result: StageResult,
    queue: &ResultQueue,
    task_repo: &dyn TaskRepository,
    archiver: &dyn Archiver,
) -> Result<(), IngestError> {
    validate(&result, task_repo).await?;

    let key = result.archive_key();
    if let Err(e) = archiver.archive(&key, &result.evidence).await {
        warn!(task_id = %result.task_id, error = %e, "archive write failed, continuing");
    }

    queue.push(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::DomainResult;
    use crate::domain::ports::{AgentTaskFilter, NullArchiver};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct FakeTaskRepo {
        task: Mutex<Option<AgentTask>>,
    }

    #[async_trait]
    impl TaskRepository for FakeTaskRepo {
        async fn create(&self, task: &AgentTask) -> DomainResult<()> {
            *self.task.lock().unwrap() = Some(task.clone());
            Ok(())
        }
        async fn get(&self, task_id: Uuid) -> DomainResult<Option<AgentTask>> {
            Ok(self.task.lock().unwrap().clone().filter(|t| t.task_id == task_id))
        }
        async fn update(&self, task: &AgentTask) -> DomainResult<()> {
            *self.task.lock().unwrap() = Some(task.clone());
            Ok(())
        }
        async fn list(&self, _filter: AgentTaskFilter) -> DomainResult<Vec<AgentTask>> {
            Ok(self.task.lock().unwrap().clone().into_iter().collect())
        }
        async fn list_pending(&self) -> DomainResult<Vec<AgentTask>> {
            Ok(vec![])
        }
    }

    fn sample_result(task_id: Uuid, agent_id: &str) -> StageResult {
        StageResult {
            task_id,
            agent_id: agent_id.to_string(),
            result_type: "port_service".to_string(),
            target_value: "10.0.0.1".to_string(),
            attributes: serde_json::json!({}),
            evidence: serde_json::json!({"raw": "banner"}),
            produced_at: Utc::now(),
        }
    }

    fn running_task(agent_id: &str) -> AgentTask {
        let mut t = AgentTask::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "port",
            serde_json::json!({}),
            "10.0.0.1",
            Default::default(),
            std::time::Duration::from_secs(30),
        );
        t.assign(agent_id).unwrap();
        t.transition(AgentTaskStatus::Running).unwrap();
        t
    }

    #[tokio::test]
    async fn backpressure_rejects_when_full_then_accepts_after_pop() {
        let queue = ResultQueue::new(2);
        let task = running_task("agent-1");
        let r1 = sample_result(task.task_id, "agent-1");
        let r2 = sample_result(task.task_id, "agent-1");
        let r3 = sample_result(task.task_id, "agent-1");

        assert!(queue.push(r1).is_ok());
        assert!(queue.push(r2).is_ok());
        assert!(matches!(queue.push(r3.clone()), Err(IngestError::Busy)));

        let _ = queue.pop().await;
        assert!(queue.push(r3).is_ok());
    }

    #[tokio::test]
    async fn validation_rejects_spoofed_agent() {
        let task = running_task("agent-1");
        let repo = FakeTaskRepo {
            task: Mutex::new(Some(task.clone())),
        };
        let result = sample_result(task.task_id, "agent-2");
        let err = validate(&result, &repo).await.unwrap_err();
        assert!(matches!(err, IngestError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn submit_queues_result_even_when_archiver_errors() {
        struct FailingArchiver;
        #[async_trait]
        impl Archiver for FailingArchiver {
            async fn archive(&self, _key: &str, _evidence: &serde_json::Value) -> std::io::Result<()> {
                Err(std::io::Error::other("disk full"))
            }
        }

        let task = running_task("agent-1");
        let repo = FakeTaskRepo {
            task: Mutex::new(Some(task.clone())),
        };
        let queue = ResultQueue::new(1);
        let result = sample_result(task.task_id, "agent-1");

        submit(result, &queue, &repo, &FailingArchiver).await.unwrap();
        assert!(queue.pop().await.is_some());
    }

    #[tokio::test]
    async fn submit_uses_null_archiver_without_error() {
        let task = running_task("agent-1");
        let repo = FakeTaskRepo {
            task: Mutex::new(Some(task.clone())),
        };
        let queue = ResultQueue::new(1);
        let result = sample_result(task.task_id, "agent-1");
        submit(result, &queue, &repo, &NullArchiver).await.unwrap();
    }
}
