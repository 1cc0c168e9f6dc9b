use crate::datasource::DataSourceError;
use crate::orchestration::{CommandError, WriteRejected};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// The remote write failed but the local change stands.
    #[error("Pending reconciliation: {0}")]
    Reconcile(String),
    /// The remote write failed and nothing was kept locally.
    #[error("Upstream write failed: {0}")]
    Upstream(String),
}

impl From<crate::config::ConfigError> for AppError {
    fn from(err: crate::config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<crate::report::ReportError> for AppError {
    fn from(err: crate::report::ReportError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<DataSourceError> for AppError {
    fn from(err: DataSourceError) -> Self {
        AppError::Upstream(err.to_string())
    }
}

impl From<WriteRejected> for AppError {
    fn from(err: WriteRejected) -> Self {
        AppError::Reconcile(err.to_string())
    }
}

impl From<CommandError> for AppError {
    fn from(err: CommandError) -> Self {
        let message = err.to_string();
        match err {
            CommandError::UnknownRecord { .. } => AppError::NotFound(message),
            CommandError::NotOwner { .. } => AppError::Forbidden(message),
            CommandError::Rejected(rejected) => rejected.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Reconcile(msg) => {
                let body = Json(json!({
                    "error": msg,
                    "reconcile": true,
                }));
                return (StatusCode::ACCEPTED, body).into_response();
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
