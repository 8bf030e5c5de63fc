//! Agent-side `MasterClient`: a `reqwest` HTTP client hitting the Master
//! API, with exponential-backoff retry on transient errors.

use std::time::Duration;

use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::models::AgentMetrics;
use crate::domain::ports::{
    MasterClient, MasterClientError, RegisterRequest, RegisterResponse, RuleVersions,
    StatusReport, WireTask,
};

#[derive(Debug, Serialize, Deserialize)]
struct ApiEnvelopeDto<T> {
    #[allow(dead_code)]
    code: u16,
    #[allow(dead_code)]
    status: String,
    #[allow(dead_code)]
    message: String,
    data: Option<T>,
    error: Option<String>,
}

pub struct HttpMasterClient {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    retry_interval: Duration,
    auth_token: std::sync::Mutex<Option<String>>,
}

impl HttpMasterClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("reqwest client configuration is valid"),
            base_url: base_url.into(),
            max_retries: 10,
            retry_interval: Duration::from_secs(5),
            auth_token: std::sync::Mutex::new(None),
        }
    }

    pub fn with_retry_policy(mut self, max_retries: u32, retry_interval: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_interval = retry_interval;
        self
    }

    /// Sets the Bearer token sent with every subsequent request. Used
    /// first for the master's bootstrap secret (before registration), then
    /// swapped to the per-agent token `register` returns — every call past
    /// that point authenticates as this specific agent, not the
    /// deployment-wide secret.
    pub fn with_auth_token(self, auth_token: impl Into<String>) -> Self {
        self.set_auth_token(auth_token);
        self
    }

    /// Swaps the bearer token used by future requests. Takes `&self` (not
    /// `&mut self`) so it can be called through the `Arc<HttpMasterClient>`
    /// the Agent shares between its poll loop and worker pool.
    pub fn set_auth_token(&self, auth_token: impl Into<String>) {
        *self.auth_token.lock().expect("auth token mutex poisoned") = Some(auth_token.into());
    }

    fn backoff(&self) -> backoff::ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.retry_interval)
            .with_max_elapsed_time(Some(self.retry_interval * self.max_retries.max(1)))
            .build()
    }

    async fn send<T: for<'de> Deserialize<'de>>(
        &self,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<T, MasterClientError> {
        let outcome = retry(self.backoff(), || async {
            let mut req = build();
            let token = self.auth_token.lock().expect("auth token mutex poisoned").clone();
            if let Some(token) = token {
                req = req.bearer_auth(token);
            }
            let response = req.send().await.map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    backoff::Error::transient(MasterClientError::Network(e.to_string()))
                } else {
                    backoff::Error::permanent(MasterClientError::Network(e.to_string()))
                }
            })?;

            let status = response.status();
            let body: ApiEnvelopeDto<T> = response
                .json()
                .await
                .map_err(|e| backoff::Error::permanent(MasterClientError::Network(e.to_string())))?;

            if status.is_success() {
                body.data
                    .ok_or_else(|| backoff::Error::permanent(MasterClientError::Http(status.as_u16(), "empty data".into())))
            } else if status.as_u16() == 503 || status.is_server_error() {
                Err(backoff::Error::transient(MasterClientError::Http(
                    status.as_u16(),
                    body.error.unwrap_or_default(),
                )))
            } else {
                Err(backoff::Error::permanent(MasterClientError::Http(
                    status.as_u16(),
                    body.error.unwrap_or_default(),
                )))
            }
        })
        .await;

        outcome
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl MasterClient for HttpMasterClient {
    async fn register(&self, req: RegisterRequest) -> Result<RegisterResponse, MasterClientError> {
        #[derive(Serialize)]
        struct WireRegisterRequest<'a> {
            hostname: &'a str,
            ip_address: &'a str,
            port: u16,
            version: &'a str,
            os: &'a str,
            arch: &'a str,
            cpu_cores: u32,
            memory_total: u64,
            disk_total: u64,
            task_support: &'a std::collections::HashSet<String>,
            tags: &'a std::collections::HashSet<String>,
            token_secret: &'a str,
        }

        let wire = WireRegisterRequest {
            hostname: &req.hostname,
            ip_address: &req.ip_address,
            port: req.port,
            version: &req.version,
            os: &req.hardware.os,
            arch: &req.hardware.arch,
            cpu_cores: req.hardware.cpu_cores,
            memory_total: req.hardware.mem_total,
            disk_total: req.hardware.disk_total,
            task_support: &req.task_support,
            tags: &req.tags,
            token_secret: &req.token_secret,
        };

        let url = self.url("/agent/register");
        self.send(|| self.client.post(&url).json(&wire)).await
    }

    async fn heartbeat(
        &self,
        agent_id: &str,
        status: &str,
        metrics: &AgentMetrics,
    ) -> Result<RuleVersions, MasterClientError> {
        #[derive(Serialize)]
        struct Body<'a> {
            agent_id: &'a str,
            status: &'a str,
            metrics: &'a AgentMetrics,
        }

        #[derive(Deserialize)]
        struct Resp {
            rule_versions: RuleVersions,
        }

        let url = self.url("/agent/heartbeat");
        let body = Body { agent_id, status, metrics };
        let resp: Resp = self.send(|| self.client.post(&url).json(&body)).await?;
        Ok(resp.rule_versions)
    }

    async fn poll_tasks(&self, agent_id: &str) -> Result<Vec<WireTask>, MasterClientError> {
        let url = self.url("/agent/tasks");
        let agent_id = agent_id.to_string();
        self.send(|| self.client.get(&url).query(&[("agent_id", agent_id.as_str())])).await
    }

    async fn report_status(&self, task_id: Uuid, report: StatusReport) -> Result<(), MasterClientError> {
        let url = self.url(&format!("/agent/tasks/{task_id}/status"));
        self.send::<Value>(|| self.client.post(&url).json(&report)).await?;
        Ok(())
    }
}
