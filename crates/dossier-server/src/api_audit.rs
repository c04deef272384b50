//! Audit trail API handlers.
//!
//! `POST /api/audit` hands the record to the best-effort sink and answers
//! `202 Accepted` whether or not it is eventually written. Reads go to the
//! table directly.

use std::sync::Arc;

use axum::{
    extract::{Extension, Json, Query},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use dossier_audit::{query_audit, recent_audit, AuditFilter, AuditRecord, NewAuditRecord};
use serde::{Deserialize, Serialize};

use crate::api::{with_conn, ApiError};
use crate::AppState;

/// Request body for `POST /api/audit`.
#[derive(Debug, Deserialize)]
pub struct RecordAuditRequest {
    pub subject_id: String,
    pub action: String,
    pub performed_by: Option<String>,
    pub details: Option<String>,
}

/// Handler for `POST /api/audit`.
pub async fn record_audit_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<RecordAuditRequest>,
) -> Result<StatusCode, ApiError> {
    if payload.subject_id.trim().is_empty() || payload.action.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "subject_id and action are required".to_string(),
        ));
    }

    let mut record = NewAuditRecord::now(payload.subject_id, payload.action);
    if let Some(performed_by) = payload.performed_by {
        record = record.by(performed_by);
    }
    if let Some(details) = payload.details {
        record = record.with_details(details);
    }
    state.audit.record(record);

    Ok(StatusCode::ACCEPTED)
}

/// Query parameters for `GET /api/audit`.
#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub subject_id: Option<String>,
    /// RFC 3339; inclusive.
    pub since: Option<DateTime<Utc>>,
    /// RFC 3339; exclusive.
    pub until: Option<DateTime<Utc>>,
    /// Maximum number of records to return (default: 100, max: 1000).
    pub limit: Option<i64>,
}

/// Response wrapper for audit retrieval.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuditResponse {
    pub records: Vec<AuditRecord>,
    pub count: usize,
}

/// Handler for `GET /api/audit`. Oldest first.
pub async fn query_audit_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<AuditQuery>,
) -> Result<Json<AuditResponse>, ApiError> {
    if let (Some(since), Some(until)) = (params.since, params.until) {
        if until < since {
            return Err(ApiError::BadRequest("until is before since".to_string()));
        }
    }

    let filter = AuditFilter {
        subject_id: params.subject_id,
        since: params.since,
        until: params.until,
        limit: Some(params.limit.unwrap_or(100).clamp(1, 1000)),
    };

    let records = with_conn(&state.pool, move |conn| Ok(query_audit(conn, &filter)?)).await?;
    let count = records.len();
    Ok(Json(AuditResponse { records, count }))
}

/// Query parameters for `GET /api/audit/recent`.
#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    /// Default: 20, max: 1000.
    pub limit: Option<i64>,
}

/// Handler for `GET /api/audit/recent`. Newest first.
pub async fn recent_audit_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<RecentQuery>,
) -> Result<Json<AuditResponse>, ApiError> {
    let limit = params.limit.unwrap_or(20).clamp(1, 1000);

    let records = with_conn(&state.pool, move |conn| Ok(recent_audit(conn, limit)?)).await?;
    let count = records.len();
    Ok(Json(AuditResponse { records, count }))
}
