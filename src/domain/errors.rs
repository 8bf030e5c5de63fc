//! Aggregate domain error, mirroring the per-component errors in [`crate::domain::error`]
//! for call sites (services, HTTP handlers) that want a single error type to propagate
//! with `?` rather than naming the originating component.

use thiserror::Error;
use uuid::Uuid;

use super::error::{DatabaseError, DispatchError, EtlError, IngestError, MatchError, TaskError};

#[derive(Debug, Error)]
pub enum DomainError {
    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Etl(#[from] EtlError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("project not found: {0}")]
    ProjectNotFound(Uuid),

    #[error("workflow not found: {0}")]
    WorkflowNotFound(Uuid),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    /// Maps this error to the HTTP status the Master API returns for it.
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::AgentNotFound(_) | Self::ProjectNotFound(_) | Self::WorkflowNotFound(_) => 404,
            Self::ValidationFailed(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Conflict(_) => 409,
            Self::Dispatch(DispatchError::RateLimited(_)) => 503,
            Self::Dispatch(DispatchError::NoCandidate) => 409,
            Self::Task(_) | Self::Ingest(_) | Self::Etl(_) | Self::Match(_) | Self::Database(_) => 500,
        }
    }

    /// Short stable code surfaced in the response envelope's `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AgentNotFound(_) | Self::ProjectNotFound(_) | Self::WorkflowNotFound(_) => "not_found",
            Self::ValidationFailed(_) => "validation",
            Self::Unauthorized(_) => "auth",
            Self::Conflict(_) => "conflict",
            Self::Dispatch(DispatchError::RateLimited(_)) => "rate_limited",
            Self::Dispatch(DispatchError::NoCandidate) => "conflict",
            Self::Task(_) | Self::Ingest(_) | Self::Etl(_) | Self::Match(_) | Self::Database(_) => "internal",
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.into())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::ValidationFailed(err.to_string())
    }
}
