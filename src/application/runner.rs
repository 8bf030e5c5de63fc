//! Runner contract and registry.
//!
//! A Runner executes one `TaskType`. The `RunnerManager` is a concurrent
//! registry keyed by `TaskType` — registration takes the write lock,
//! dispatch only ever needs the read lock, matching the Substrate/
//! SubstrateFactory split in shape (trait-object port + lookup-by-key).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::domain::models::{Task, TaskResult, TaskType};

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("no runner registered for task type {0}")]
    NoRunner(String),

    #[error("runner panicked or failed: {0}")]
    Failed(String),

    #[error("cancelled")]
    Cancelled,
}

#[async_trait]
pub trait Runner: Send + Sync {
    fn name(&self) -> TaskType;

    async fn run(&self, task: &Task, cancel: CancellationToken) -> Result<Vec<TaskResult>, RunnerError>;
}

/// Registry of `TaskType -> Runner`. Registration is idempotent: a second
/// `register` for the same `TaskType` replaces the previous runner.
#[derive(Default)]
pub struct RunnerManager {
    runners: RwLock<HashMap<TaskType, Arc<dyn Runner>>>,
}

impl RunnerManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, runner: Arc<dyn Runner>) {
        let mut guard = self.runners.write().await;
        guard.insert(runner.name(), runner);
    }

    pub async fn execute(
        &self,
        task: &Task,
        cancel: CancellationToken,
    ) -> Result<Vec<TaskResult>, RunnerError> {
        let runner = {
            let guard = self.runners.read().await;
            guard
                .get(&task.task_type)
                .cloned()
                .ok_or_else(|| RunnerError::NoRunner(task.task_type.as_str().to_string()))?
        };
        runner.run(task, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ResultStatus, TaskResult};

    struct EchoRunner;

    #[async_trait]
    impl Runner for EchoRunner {
        fn name(&self) -> TaskType {
            TaskType::Alive
        }

        async fn run(&self, task: &Task, _cancel: CancellationToken) -> Result<Vec<TaskResult>, RunnerError> {
            Ok(vec![TaskResult {
                task_id: task.id,
                status: ResultStatus::Completed,
                data: vec![],
                error: None,
                executed_at: task.created_at,
                completed_at: task.created_at,
            }])
        }
    }

    #[tokio::test]
    async fn dispatches_to_registered_runner() {
        let manager = RunnerManager::new();
        manager.register(Arc::new(EchoRunner)).await;

        let task = Task::new(TaskType::Alive, "10.0.0.1");
        let result = manager.execute(&task, CancellationToken::new()).await.unwrap();
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn unregistered_type_errors() {
        let manager = RunnerManager::new();
        let task = Task::new(TaskType::Web, "http://x");
        let err = manager.execute(&task, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, RunnerError::NoRunner(_)));
    }

    #[tokio::test]
    async fn registration_is_idempotent_per_type() {
        let manager = RunnerManager::new();
        manager.register(Arc::new(EchoRunner)).await;
        manager.register(Arc::new(EchoRunner)).await;
        assert_eq!(manager.runners.read().await.len(), 1);
    }
}
