//! Dossier server library logic.

pub mod api;
pub mod api_appointments;
pub mod api_audit;
pub mod api_timeline;
pub mod background;
pub mod config;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use dossier_appointments::AppointmentEngine;
use dossier_audit::AuditSink;
use dossier_db::DbPool;
use dossier_types::ActorDirectory;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Appointment negotiation engine, wired to the notification queue.
    pub engine: AppointmentEngine,
    /// Best-effort writer for side-fact audit records.
    pub audit: Arc<dyn AuditSink>,
    /// Display-name lookup for rendered timelines.
    pub directory: Arc<dyn ActorDirectory>,
}

/// Maximum request body size (256 KiB).
const MAX_REQUEST_BODY_BYTES: usize = 256 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/transactions",
            post(api_timeline::open_transaction_handler),
        )
        .route(
            "/api/transactions/{transactionId}/stage",
            post(api_timeline::change_stage_handler),
        )
        .route(
            "/api/transactions/{transactionId}/timeline",
            get(api_timeline::list_timeline_handler).post(api_timeline::append_entry_handler),
        )
        .route(
            "/api/transactions/{transactionId}/unseen",
            get(api_timeline::unseen_count_handler),
        )
        .route(
            "/api/transactions/{transactionId}/appointments",
            get(api_appointments::list_appointments_handler),
        )
        .route(
            "/api/brokers/{brokerId}/unseen",
            get(api_timeline::broker_unseen_counts_handler),
        )
        .route(
            "/api/clients/{clientId}/feed",
            get(api_timeline::client_feed_handler),
        )
        .route("/api/seen", post(api_timeline::mark_seen_handler))
        .route("/api/seen/status", post(api_timeline::seen_status_handler))
        .route(
            "/api/appointments",
            post(api_appointments::request_appointment_handler),
        )
        .route(
            "/api/appointments/{appointmentId}",
            get(api_appointments::get_appointment_handler),
        )
        .route(
            "/api/appointments/{appointmentId}/history",
            get(api_appointments::appointment_history_handler),
        )
        .route(
            "/api/appointments/{appointmentId}/review",
            post(api_appointments::review_appointment_handler),
        )
        .route(
            "/api/appointments/{appointmentId}/cancel",
            post(api_appointments::cancel_appointment_handler),
        )
        .route(
            "/api/audit",
            post(api_audit::record_audit_handler).get(api_audit::query_audit_handler),
        )
        .route("/api/audit/recent", get(api_audit::recent_audit_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
