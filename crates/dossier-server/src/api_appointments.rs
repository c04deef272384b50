//! Appointment negotiation API handlers.

use std::sync::Arc;

use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
};
use dossier_appointments::{
    appointment_history, get_appointment, list_appointments, Appointment,
    AppointmentAuditRecord, AppointmentRequest, ReviewAction,
};
use serde::Deserialize;

use crate::api::{with_conn, ApiError};
use crate::AppState;

/// Handler for `POST /api/appointments`.
pub async fn request_appointment_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<AppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    let engine = state.engine.clone();
    let appointment =
        with_conn(&state.pool, move |conn| Ok(engine.request(conn, &payload)?)).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

/// Handler for `GET /api/appointments/{appointmentId}`.
pub async fn get_appointment_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Appointment>, ApiError> {
    let appointment = with_conn(&state.pool, move |conn| {
        Ok(get_appointment(conn, &appointment_id)?)
    })
    .await?;
    Ok(Json(appointment))
}

/// Handler for `GET /api/appointments/{appointmentId}/history`.
pub async fn appointment_history_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Vec<AppointmentAuditRecord>>, ApiError> {
    let history = with_conn(&state.pool, move |conn| {
        Ok(appointment_history(conn, &appointment_id)?)
    })
    .await?;
    Ok(Json(history))
}

/// Handler for `GET /api/transactions/{transactionId}/appointments`.
pub async fn list_appointments_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(transaction_id): Path<String>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let appointments = with_conn(&state.pool, move |conn| {
        dossier_timeline::get_transaction(conn, &transaction_id)?;
        Ok(list_appointments(conn, &transaction_id)?)
    })
    .await?;
    Ok(Json(appointments))
}

/// Request body for `POST /api/appointments/{appointmentId}/review`.
///
/// ```json
/// { "reviewer_id": "client-1", "action": "DECLINE", "refusal_reason": "Away" }
/// ```
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub reviewer_id: String,
    #[serde(flatten)]
    pub action: ReviewAction,
}

/// Handler for `POST /api/appointments/{appointmentId}/review`.
pub async fn review_appointment_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(appointment_id): Path<String>,
    Json(payload): Json<ReviewRequest>,
) -> Result<Json<Appointment>, ApiError> {
    let engine = state.engine.clone();
    let appointment = with_conn(&state.pool, move |conn| {
        Ok(engine.review(conn, &appointment_id, &payload.reviewer_id, &payload.action)?)
    })
    .await?;
    Ok(Json(appointment))
}

/// Request body for `POST /api/appointments/{appointmentId}/cancel`.
#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub canceller_id: String,
    pub reason: String,
}

/// Handler for `POST /api/appointments/{appointmentId}/cancel`.
pub async fn cancel_appointment_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(appointment_id): Path<String>,
    Json(payload): Json<CancelRequest>,
) -> Result<Json<Appointment>, ApiError> {
    let engine = state.engine.clone();
    let appointment = with_conn(&state.pool, move |conn| {
        Ok(engine.cancel(
            conn,
            &appointment_id,
            &payload.canceller_id,
            &payload.reason,
        )?)
    })
    .await?;
    Ok(Json(appointment))
}
