//! SQLite implementation of `EtlErrorRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{EtlErrorRecord, EtlErrorStatus};
use crate::domain::ports::EtlErrorRepository;

#[derive(sqlx::FromRow)]
struct EtlErrorRow {
    id: String,
    project_id: Option<String>,
    task_id: String,
    result_type: String,
    raw_data_json: String,
    error_msg: String,
    error_stage: String,
    status: String,
    created_at: String,
}

impl TryFrom<EtlErrorRow> for EtlErrorRecord {
    type Error = anyhow::Error;

    fn try_from(row: EtlErrorRow) -> Result<Self, Self::Error> {
        Ok(EtlErrorRecord {
            id: Uuid::parse_str(&row.id)?,
            project_id: row.project_id.map(|p| Uuid::parse_str(&p)).transpose()?,
            task_id: Uuid::parse_str(&row.task_id)?,
            result_type: row.result_type,
            raw_data: serde_json::from_str::<Value>(&row.raw_data_json)?,
            error_msg: row.error_msg,
            error_stage: row.error_stage,
            status: parse_status(&row.status),
            created_at: row.created_at.parse::<DateTime<Utc>>()?,
        })
    }
}

fn parse_status(s: &str) -> EtlErrorStatus {
    match s {
        "retrying" => EtlErrorStatus::Retrying,
        "fixed" => EtlErrorStatus::Fixed,
        "ignored" => EtlErrorStatus::Ignored,
        _ => EtlErrorStatus::New,
    }
}

fn status_str(status: EtlErrorStatus) -> &'static str {
    match status {
        EtlErrorStatus::New => "new",
        EtlErrorStatus::Retrying => "retrying",
        EtlErrorStatus::Fixed => "fixed",
        EtlErrorStatus::Ignored => "ignored",
    }
}

pub struct SqliteEtlErrorRepository {
    pool: SqlitePool,
}

impl SqliteEtlErrorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn map_err(e: anyhow::Error) -> DomainError {
    DomainError::ValidationFailed(e.to_string())
}

#[async_trait]
impl EtlErrorRepository for SqliteEtlErrorRepository {
    async fn create(&self, record: &EtlErrorRecord) -> DomainResult<()> {
        let raw_data_json = serde_json::to_string(&record.raw_data)?;
        sqlx::query(
            r#"INSERT INTO etl_errors (id, project_id, task_id, result_type, raw_data_json,
               error_msg, error_stage, status, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.id.to_string())
        .bind(record.project_id.map(|p| p.to_string()))
        .bind(record.task_id.to_string())
        .bind(&record.result_type)
        .bind(&raw_data_json)
        .bind(&record.error_msg)
        .bind(&record.error_stage)
        .bind(status_str(record.status))
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<EtlErrorRecord>> {
        let row: Option<EtlErrorRow> = sqlx::query_as("SELECT * FROM etl_errors WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(EtlErrorRecord::try_from).transpose().map_err(map_err)
    }

    async fn update(&self, record: &EtlErrorRecord) -> DomainResult<()> {
        sqlx::query("UPDATE etl_errors SET status = ? WHERE id = ?")
            .bind(status_str(record.status))
            .bind(record.id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_new(&self) -> DomainResult<Vec<EtlErrorRecord>> {
        let rows: Vec<EtlErrorRow> = sqlx::query_as("SELECT * FROM etl_errors WHERE status = 'new'")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(|r| EtlErrorRecord::try_from(r).map_err(map_err)).collect()
    }

    async fn list_all(&self) -> DomainResult<Vec<EtlErrorRecord>> {
        let rows: Vec<EtlErrorRow> = sqlx::query_as("SELECT * FROM etl_errors").fetch_all(&self.pool).await?;
        rows.into_iter().map(|r| EtlErrorRecord::try_from(r).map_err(map_err)).collect()
    }
}
