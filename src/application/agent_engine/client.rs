//! AgentClient: drives the register -> heartbeat/poll loop against the
//! Master over the `MasterClient` port.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::domain::models::{AgentMetrics, Task};
use crate::domain::ports::{MasterClient, RegisterRequest, RegisterResponse};

use super::translator::TaskTranslator;

pub struct AgentClient {
    master: Arc<dyn MasterClient>,
    heartbeat_interval: Duration,
    poll_interval: Duration,
}

impl AgentClient {
    pub fn new(master: Arc<dyn MasterClient>, heartbeat_interval: Duration, poll_interval: Duration) -> Self {
        Self { master, heartbeat_interval, poll_interval }
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<RegisterResponse, crate::domain::ports::MasterClientError> {
        self.master.register(req).await
    }

    /// Runs the heartbeat and task-poll loops on independent tickers until
    /// `cancel` fires, pushing successfully translated tasks onto
    /// `task_tx`. A task that fails translation (unknown type, non-string
    /// target) is logged and dropped rather than stalling the whole poll.
    pub async fn run(&self, agent_id: String, metrics_source: Arc<dyn Fn() -> AgentMetrics + Send + Sync>, task_tx: mpsc::Sender<Task>, cancel: CancellationToken) {
        let mut heartbeat_ticker = tokio::time::interval(self.heartbeat_interval);
        let mut poll_ticker = tokio::time::interval(self.poll_interval);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(agent_id = %agent_id, "agent client loop cancelled");
                    return;
                }
                _ = heartbeat_ticker.tick() => {
                    let metrics = metrics_source();
                    if let Err(e) = self.master.heartbeat(&agent_id, "online", &metrics).await {
                        warn!(agent_id = %agent_id, error = %e, "heartbeat failed");
                    }
                }
                _ = poll_ticker.tick() => {
                    match self.master.poll_tasks(&agent_id).await {
                        Ok(wire_tasks) => {
                            for wire in wire_tasks {
                                match TaskTranslator::translate(wire) {
                                    Ok(task) => {
                                        if task_tx.send(task).await.is_err() {
                                            warn!(agent_id = %agent_id, "task channel closed, stopping poll loop");
                                            return;
                                        }
                                    }
                                    Err(e) => error!(agent_id = %agent_id, error = %e, "dropping untranslatable task"),
                                }
                            }
                        }
                        Err(e) => warn!(agent_id = %agent_id, error = %e, "poll_tasks failed"),
                    }
                }
            }
        }
    }
}
