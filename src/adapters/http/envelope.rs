//! `ApiEnvelope<T>`: the unified response shape every Master endpoint
//! returns — `{code, status, message, data?, error?}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use crate::domain::errors::DomainError;

#[derive(Debug, Serialize)]
pub struct ApiEnvelope<T: Serialize> {
    pub code: u16,
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self { code: 200, status: "success", message: "ok".to_string(), data: Some(data), error: None }
    }

    pub fn ok_with_code(code: u16, message: impl Into<String>, data: T) -> Self {
        Self { code, status: "success", message: message.into(), data: Some(data), error: None }
    }
}

impl<T: Serialize> IntoResponse for ApiEnvelope<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

/// The failure side of the envelope; `T` is fixed to `()` so it serializes
/// `data` away entirely via `skip_serializing_if`.
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.http_status();
        let envelope = ApiEnvelope::<()> {
            code,
            status: "failed",
            message: self.0.code().to_string(),
            data: None,
            error: Some(self.0.to_string()),
        };
        (StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), Json(envelope)).into_response()
    }
}

pub type ApiResult<T> = Result<ApiEnvelope<T>, ApiError>;
