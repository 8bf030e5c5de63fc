//! Bounded worker pool draining a task channel onto the `RunnerManager`,
//! gated by the `AdaptiveLimiter` and reporting through the `Reporter`.
//! Follows the `JoinSet`-of-workers shape used by `services::etl::EtlProcessor`.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::application::limiter::AdaptiveLimiter;
use crate::application::runner::RunnerManager;
use crate::domain::models::Task;

use super::reporter::Reporter;

/// Receiving half of the Agent's inbound task queue, shared across
/// workers behind a `Mutex` the same way `services::ingestor::ResultQueue`
/// guards its receiver.
pub struct TaskQueue {
    rx: Mutex<mpsc::Receiver<Task>>,
}

impl TaskQueue {
    pub fn channel(capacity: usize) -> (mpsc::Sender<Task>, Arc<Self>) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Arc::new(Self { rx: Mutex::new(rx) }))
    }

    async fn pop(&self) -> Option<Task> {
        self.rx.lock().await.recv().await
    }
}

pub struct WorkerPool {
    queue: Arc<TaskQueue>,
    runners: Arc<RunnerManager>,
    limiter: Arc<AdaptiveLimiter>,
    reporter: Arc<Reporter>,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<TaskQueue>,
        runners: Arc<RunnerManager>,
        limiter: Arc<AdaptiveLimiter>,
        reporter: Arc<Reporter>,
    ) -> Self {
        Self { queue, runners, limiter, reporter }
    }

    /// Spawns `worker_count` workers, each looping: pop a task, acquire a
    /// limiter permit, execute, release, report. `cancel` stops both the
    /// permit wait and the in-flight run.
    pub fn spawn(self: Arc<Self>, worker_count: usize, cancel: CancellationToken) -> JoinSet<()> {
        let mut set = JoinSet::new();
        for _ in 0..worker_count {
            let this = Arc::clone(&self);
            let cancel = cancel.clone();
            set.spawn(async move {
                while let Some(task) = this.queue.pop().await {
                    if cancel.is_cancelled() {
                        break;
                    }
                    this.run_one(task, &cancel).await;
                }
            });
        }
        set
    }

    async fn run_one(&self, task: Task, cancel: &CancellationToken) {
        let Some(permit) = self.limiter.acquire(cancel).await else {
            return;
        };

        let outcome = self.runners.execute(&task, cancel.clone()).await;
        self.limiter.release(permit).await;

        match outcome {
            Ok(results) => {
                self.limiter.on_success().await;
                for result in results {
                    if let Err(e) = self.reporter.report(task.id, result).await {
                        warn!(task_id = %task.id, error = %e, "failed to report task result");
                    }
                }
            }
            Err(e) => {
                self.limiter.on_failure().await;
                error!(task_id = %task.id, error = %e, "task run failed");
                if let Err(report_err) = self.reporter.report_failure(task.id, e.to_string()).await {
                    warn!(task_id = %task.id, error = %report_err, "failed to report task failure");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::runner::{Runner, RunnerError};
    use crate::domain::models::{ResultStatus, TaskResult, TaskType};
    use crate::domain::ports::master_client::{MasterClientError, RegisterRequest, RegisterResponse, RuleVersions, StatusReport, WireTask};
    use crate::domain::ports::MasterClient;
    use async_trait::async_trait;
    use uuid::Uuid;

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

    struct CountingClient {
        reports: std::sync::Mutex<u32>,
    }

    #[async_trait]
    impl MasterClient for CountingClient {
        async fn register(&self, _req: RegisterRequest) -> Result<RegisterResponse, MasterClientError> {
            unimplemented!()
        }
        async fn heartbeat(
            &self,
            _agent_id: &str,
            _status: &str,
            _metrics: &crate::domain::models::AgentMetrics,
        ) -> Result<RuleVersions, MasterClientError> {
            unimplemented!()
        }
        async fn poll_tasks(&self, _agent_id: &str) -> Result<Vec<WireTask>, MasterClientError> {
            unimplemented!()
        }
        async fn report_status(&self, _task_id: Uuid, _report: StatusReport) -> Result<(), MasterClientError> {
            *self.reports.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn worker_executes_and_reports_queued_task() {
        let runners = Arc::new(RunnerManager::new());
        runners.register(Arc::new(EchoRunner)).await;
        let limiter = Arc::new(AdaptiveLimiter::new(4, 1, 4));
        let client = Arc::new(CountingClient { reports: std::sync::Mutex::new(0) });
        let reporter = Arc::new(Reporter::new(client.clone()));

        let (tx, queue) = TaskQueue::channel(4);
        let pool = Arc::new(WorkerPool::new(queue, runners, limiter, reporter));
        let cancel = CancellationToken::new();
        let mut set = pool.spawn(1, cancel.clone());

        tx.send(Task::new(TaskType::Alive, "10.0.0.1")).await.unwrap();
        drop(tx);

        while set.join_next().await.is_some() {}
        assert_eq!(*client.reports.lock().unwrap(), 1);
    }
}
