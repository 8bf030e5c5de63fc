//! SQLite implementation of `AgentRepository`.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Agent, AgentHardware, AgentMetrics, AgentStatus};
use crate::domain::ports::AgentRepository;

#[derive(sqlx::FromRow)]
struct AgentRow {
    agent_id: String,
    hostname: String,
    ip: String,
    port: i64,
    hardware_json: String,
    status: String,
    last_heartbeat: String,
    token: String,
    token_expiry: String,
    task_support_json: String,
    tags_json: String,
}

impl TryFrom<AgentRow> for Agent {
    type Error = serde_json::Error;

    fn try_from(row: AgentRow) -> Result<Self, Self::Error> {
        Ok(Agent {
            agent_id: row.agent_id,
            hostname: row.hostname,
            ip: row.ip,
            port: row.port as u16,
            hardware: serde_json::from_str::<AgentHardware>(&row.hardware_json)?,
            status: AgentStatus::parse_str(&row.status).unwrap_or(AgentStatus::Offline),
            last_heartbeat: row.last_heartbeat.parse::<DateTime<Utc>>().unwrap_or_else(|_| Utc::now()),
            token: row.token,
            token_expiry: row.token_expiry.parse::<DateTime<Utc>>().unwrap_or_else(|_| Utc::now()),
            task_support: serde_json::from_str::<HashSet<String>>(&row.task_support_json)?,
            tags: serde_json::from_str::<HashSet<String>>(&row.tags_json)?,
        })
    }
}

pub struct SqliteAgentRepository {
    pool: SqlitePool,
}

impl SqliteAgentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgentRepository for SqliteAgentRepository {
    async fn upsert(&self, agent: &Agent) -> DomainResult<()> {
        let hardware_json = serde_json::to_string(&agent.hardware)?;
        let task_support_json = serde_json::to_string(&agent.task_support)?;
        let tags_json = serde_json::to_string(&agent.tags)?;

        sqlx::query(
            r#"INSERT INTO agents (agent_id, hostname, ip, port, hardware_json, status,
               last_heartbeat, token, token_expiry, task_support_json, tags_json)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(agent_id) DO UPDATE SET
                 hostname = excluded.hostname, ip = excluded.ip, port = excluded.port,
                 hardware_json = excluded.hardware_json, status = excluded.status,
                 last_heartbeat = excluded.last_heartbeat, token = excluded.token,
                 token_expiry = excluded.token_expiry, task_support_json = excluded.task_support_json,
                 tags_json = excluded.tags_json"#,
        )
        .bind(&agent.agent_id)
        .bind(&agent.hostname)
        .bind(&agent.ip)
        .bind(agent.port as i64)
        .bind(&hardware_json)
        .bind(agent.status.as_str())
        .bind(agent.last_heartbeat.to_rfc3339())
        .bind(&agent.token)
        .bind(agent.token_expiry.to_rfc3339())
        .bind(&task_support_json)
        .bind(&tags_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, agent_id: &str) -> DomainResult<Option<Agent>> {
        let row: Option<AgentRow> = sqlx::query_as("SELECT * FROM agents WHERE agent_id = ?")
            .bind(agent_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Agent::try_from).transpose()?)
    }

    async fn find_by_token(&self, token: &str) -> DomainResult<Option<Agent>> {
        let row: Option<AgentRow> = sqlx::query_as("SELECT * FROM agents WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Agent::try_from).transpose()?)
    }

    async fn update_status(&self, agent_id: &str, status: AgentStatus) -> DomainResult<()> {
        sqlx::query("UPDATE agents SET status = ? WHERE agent_id = ?")
            .bind(status.as_str())
            .bind(agent_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn touch_heartbeat(&self, agent_id: &str) -> DomainResult<()> {
        sqlx::query("UPDATE agents SET last_heartbeat = ? WHERE agent_id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(agent_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_online(&self) -> DomainResult<Vec<Agent>> {
        let rows: Vec<AgentRow> = sqlx::query_as("SELECT * FROM agents WHERE status = 'online'")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Agent::try_from).collect::<Result<_, _>>()?)
    }

    async fn list_all(&self) -> DomainResult<Vec<Agent>> {
        let rows: Vec<AgentRow> = sqlx::query_as("SELECT * FROM agents").fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Agent::try_from).collect::<Result<_, _>>()?)
    }

    async fn record_metrics(&self, metrics: &AgentMetrics) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO agent_metrics (agent_id, sequence, cpu, mem, disk, net_sent, net_recv,
               running_tasks, completed_tasks, failed_tasks, work_status, timestamp)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&metrics.agent_id)
        .bind(metrics.sequence as i64)
        .bind(metrics.cpu)
        .bind(metrics.mem)
        .bind(metrics.disk)
        .bind(metrics.net_sent as i64)
        .bind(metrics.net_recv as i64)
        .bind(metrics.running_tasks as i64)
        .bind(metrics.completed_tasks as i64)
        .bind(metrics.failed_tasks as i64)
        .bind(serde_json::to_string(&metrics.work_status)?)
        .bind(metrics.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
