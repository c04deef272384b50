//! Shared plumbing for the HTTP handlers: the error type every handler
//! returns and the helper that runs storage work off the async runtime.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dossier_appointments::AppointmentError;
use dossier_audit::AuditError;
use dossier_db::DbPool;
use dossier_timeline::TimelineError;
use rusqlite::Connection;
use thiserror::Error;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("unprocessable: {0}")]
    Unprocessable(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::InternalServerError(msg) => {
                tracing::error!(error = %msg, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<TimelineError> for ApiError {
    fn from(e: TimelineError) -> Self {
        match e {
            TimelineError::TransactionNotFound(_) => ApiError::NotFound(e.to_string()),
            TimelineError::TransactionExists(_) => ApiError::Conflict(e.to_string()),
            TimelineError::Database(_) | TimelineError::Serialization(_) => {
                ApiError::InternalServerError(e.to_string())
            }
        }
    }
}

impl From<AppointmentError> for ApiError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            AppointmentError::InvalidTransition { .. } | AppointmentError::Conflict(_) => {
                ApiError::Conflict(e.to_string())
            }
            AppointmentError::Validation(_) => ApiError::Unprocessable(e.to_string()),
            AppointmentError::Internal(_) | AppointmentError::Database(_) => {
                ApiError::InternalServerError(e.to_string())
            }
        }
    }
}

impl From<AuditError> for ApiError {
    fn from(e: AuditError) -> Self {
        ApiError::InternalServerError(e.to_string())
    }
}

/// Runs `f` with a pooled connection on the blocking thread pool.
pub(crate) async fn with_conn<T, F>(pool: &DbPool, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T, ApiError> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool
            .get()
            .map_err(|e| ApiError::InternalServerError(format!("database pool: {e}")))?;
        f(&*conn)
    })
    .await
    .map_err(|e| ApiError::InternalServerError(format!("task join error: {e}")))?
}
