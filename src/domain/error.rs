//! Per-component error types for the NeoScan distributed scanning engine.
//!
//! Each enum carries a stable code (its variant name) and a human message,
//! and classifies itself as transient or permanent so the retry layer
//! (Agent<->Master RPC, per-probe scanner retries) can decide what to do
//! with it without re-deriving the policy at every call site.

use thiserror::Error;
use uuid::Uuid;

/// Errors from Task / AgentTask lifecycle operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("task not found: {0}")]
    NotFound(Uuid),

    #[error("task already exists: {0}")]
    AlreadyExists(Uuid),

    #[error("invalid status transition from {from:?} to {to:?}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("task cannot be retried (max retries reached)")]
    MaxRetriesExceeded,

    #[error("no runner registered for task type {0}")]
    NoRunner(String),
}

impl TaskError {
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::MaxRetriesExceeded | Self::AlreadyExists(_))
    }

    pub const fn is_transient(&self) -> bool {
        !self.is_permanent()
    }
}

/// Errors surfaced by the Master's dispatcher/allocator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("no capability-matched agent available")]
    NoCandidate,

    #[error("agent {0} rejected by rate gate")]
    RateLimited(String),
}

/// Errors from the result ingestion queue/validator/archiver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("system busy: ingestion queue is full")]
    Busy,

    #[error("validation failed: {0}")]
    ValidationFailed(String),
}

impl IngestError {
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

/// Errors raised while processing a `StageResult` into assets.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EtlError {
    #[error("unparseable attributes for result type {0}: {1}")]
    UnparseableAttributes(String, String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Errors from the generic boolean rule matcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    #[error("field path not found: {0}")]
    FieldNotFound(String),

    #[error("invalid CIDR: {0}")]
    InvalidCidr(String),

    #[error("invalid regex: {0}")]
    InvalidRegex(String),
}

/// Errors from rule-pack packaging/distribution.
#[derive(Error, Debug)]
pub enum RulePackError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Errors from configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}

/// Errors from the persistence layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("query failed: {0}")]
    QueryFailed(String),

    #[error("row not found")]
    RowNotFound,

    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl DatabaseError {
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_))
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::RowNotFound,
            other => Self::QueryFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_error_permanence_classification() {
        assert!(TaskError::MaxRetriesExceeded.is_permanent());
        assert!(TaskError::NotFound(Uuid::new_v4()).is_transient());
    }

    #[test]
    fn ingest_error_busy_is_transient() {
        assert!(IngestError::Busy.is_transient());
        assert!(!IngestError::ValidationFailed("x".into()).is_transient());
    }

    #[test]
    fn database_error_from_sqlx_row_not_found() {
        let err: DatabaseError = sqlx::Error::RowNotFound.into();
        assert_eq!(err, DatabaseError::RowNotFound);
    }
}
