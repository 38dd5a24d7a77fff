use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::facade::FacadeError;

/// Facade error rendered as an HTTP response.
pub struct ApiError(pub FacadeError);

impl From<FacadeError> for ApiError {
    fn from(e: FacadeError) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn kind(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            FacadeError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            FacadeError::AlreadyRunning { .. } => (StatusCode::CONFLICT, "already_running"),
            FacadeError::NotRunning { .. } => (StatusCode::CONFLICT, "not_running"),
            FacadeError::Launch { .. } => (StatusCode::BAD_GATEWAY, "launch"),
            FacadeError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            FacadeError::PartialSync { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "partial_sync"),
            FacadeError::Persist(_) => (StatusCode::INTERNAL_SERVER_ERROR, "persist"),
            FacadeError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io"),
            FacadeError::Parse(_) => (StatusCode::INTERNAL_SERVER_ERROR, "parse"),
            FacadeError::Encode(_) => (StatusCode::INTERNAL_SERVER_ERROR, "encode"),
            FacadeError::Signal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "signal"),
            FacadeError::ForceKill(_) => (StatusCode::INTERNAL_SERVER_ERROR, "force_kill"),
            FacadeError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.kind();
        if status.is_server_error() {
            tracing::error!(kind, error = %self.0, "Admin request failed");
        }
        (status, Json(json!({ "error": self.0.to_string(), "kind": kind }))).into_response()
    }
}
