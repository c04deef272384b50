//! Timeline and seen-state API handlers.
//!
//! Provides:
//! - `POST /api/transactions` opens a transaction with its CREATED entry
//! - `POST /api/transactions/{transactionId}/stage` records a stage change
//! - `GET|POST /api/transactions/{transactionId}/timeline` reads or appends
//! - `GET /api/transactions/{transactionId}/unseen` counts unseen entries
//! - `POST /api/seen`, `POST /api/seen/status` mark and look up seen-state
//! - `GET /api/brokers/{brokerId}/unseen` unseen counts per transaction
//! - `GET /api/clients/{clientId}/feed` the client-visible feed

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Json, Path, Query},
    http::StatusCode,
};
use dossier_timeline::{
    append_entry, change_stage, get_transaction, list_client_feed, list_for_transaction,
    mark_seen, open_transaction, render_timeline, seen_status, unseen_count, unseen_counts,
    Audience, NewTimelineEntry, NewTransaction, SortOrder, TimelineEntry, TimelineEvent,
    TimelineItem, Transaction,
};
use serde::{Deserialize, Serialize};

use crate::api::{with_conn, ApiError};
use crate::AppState;

/// Response body for `POST /api/transactions`.
#[derive(Debug, Serialize, Deserialize)]
pub struct OpenTransactionResponse {
    pub transaction: Transaction,
    pub entry: TimelineEntry,
}

/// Handler for `POST /api/transactions`.
pub async fn open_transaction_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<NewTransaction>,
) -> Result<(StatusCode, Json<OpenTransactionResponse>), ApiError> {
    if payload.transaction_id.trim().is_empty() {
        return Err(ApiError::BadRequest("transaction_id is required".to_string()));
    }

    let (transaction, entry) = with_conn(&state.pool, move |conn| {
        Ok(open_transaction(conn, &payload)?)
    })
    .await?;

    tracing::info!(transaction_id = %transaction.transaction_id, "transaction opened");
    Ok((
        StatusCode::CREATED,
        Json(OpenTransactionResponse { transaction, entry }),
    ))
}

/// Request body for `POST /api/transactions/{transactionId}/stage`.
#[derive(Debug, Deserialize)]
pub struct ChangeStageRequest {
    pub actor_id: String,
    pub new_stage: String,
    pub reason: Option<String>,
    #[serde(default = "default_visible")]
    pub visible_to_client: bool,
}

fn default_visible() -> bool {
    true
}

/// Handler for `POST /api/transactions/{transactionId}/stage`.
pub async fn change_stage_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(transaction_id): Path<String>,
    Json(payload): Json<ChangeStageRequest>,
) -> Result<(StatusCode, Json<TimelineEntry>), ApiError> {
    if payload.new_stage.trim().is_empty() {
        return Err(ApiError::BadRequest("new_stage is required".to_string()));
    }

    let entry = with_conn(&state.pool, move |conn| {
        Ok(change_stage(
            conn,
            &transaction_id,
            &payload.actor_id,
            &payload.new_stage,
            payload.reason.as_deref(),
            payload.visible_to_client,
        )?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(entry)))
}

/// Query parameters for `GET /api/transactions/{transactionId}/timeline`.
#[derive(Debug, Deserialize)]
pub struct TimelineQuery {
    /// `BROKER` (default) or `CLIENT`.
    pub audience: Option<Audience>,
    /// `OLDEST_FIRST` (default) or `NEWEST_FIRST`.
    pub order: Option<SortOrder>,
}

/// Handler for `GET /api/transactions/{transactionId}/timeline`.
///
/// Entries are returned with their actor's display name when the directory
/// knows it.
pub async fn list_timeline_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(transaction_id): Path<String>,
    Query(params): Query<TimelineQuery>,
) -> Result<Json<Vec<TimelineItem>>, ApiError> {
    let audience = params.audience.unwrap_or(Audience::Broker);
    let order = params.order.unwrap_or_default();

    let entries = with_conn(&state.pool, move |conn| {
        Ok(list_for_transaction(conn, &transaction_id, audience, order)?)
    })
    .await?;

    Ok(Json(render_timeline(entries, state.directory.as_ref())))
}

/// Request body for `POST /api/transactions/{transactionId}/timeline`.
#[derive(Debug, Deserialize)]
pub struct AppendEntryRequest {
    pub actor_id: Option<String>,
    pub note: Option<String>,
    #[serde(default)]
    pub visible_to_client: bool,
    pub event: TimelineEvent,
}

/// Handler for `POST /api/transactions/{transactionId}/timeline`.
pub async fn append_entry_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(transaction_id): Path<String>,
    Json(payload): Json<AppendEntryRequest>,
) -> Result<(StatusCode, Json<TimelineEntry>), ApiError> {
    let entry = NewTimelineEntry {
        transaction_id,
        actor_id: payload.actor_id,
        note: payload.note,
        visible_to_client: payload.visible_to_client,
        event: payload.event,
    };

    let stored = with_conn(&state.pool, move |conn| Ok(append_entry(conn, &entry)?)).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// Query parameters naming the viewing broker.
#[derive(Debug, Deserialize)]
pub struct BrokerQuery {
    pub broker_id: String,
}

/// Response body for `GET /api/transactions/{transactionId}/unseen`.
#[derive(Debug, Serialize, Deserialize)]
pub struct UnseenCountResponse {
    pub transaction_id: String,
    pub broker_id: String,
    pub unseen: i64,
}

/// Handler for `GET /api/transactions/{transactionId}/unseen`.
pub async fn unseen_count_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(transaction_id): Path<String>,
    Query(params): Query<BrokerQuery>,
) -> Result<Json<UnseenCountResponse>, ApiError> {
    with_conn(&state.pool, move |conn| {
        get_transaction(conn, &transaction_id)?;
        let unseen = unseen_count(conn, &params.broker_id, &transaction_id)?;
        Ok(Json(UnseenCountResponse {
            transaction_id,
            broker_id: params.broker_id,
            unseen,
        }))
    })
    .await
}

/// Handler for `GET /api/brokers/{brokerId}/unseen`.
pub async fn broker_unseen_counts_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(broker_id): Path<String>,
) -> Result<Json<HashMap<String, i64>>, ApiError> {
    let counts = with_conn(&state.pool, move |conn| Ok(unseen_counts(conn, &broker_id)?)).await?;
    Ok(Json(counts))
}

/// Request body for `POST /api/seen`.
#[derive(Debug, Deserialize)]
pub struct MarkSeenRequest {
    pub broker_id: String,
    pub entry_id: String,
}

/// Handler for `POST /api/seen`. Marking twice is not an error.
pub async fn mark_seen_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<MarkSeenRequest>,
) -> Result<StatusCode, ApiError> {
    with_conn(&state.pool, move |conn| {
        Ok(mark_seen(conn, &payload.broker_id, &payload.entry_id)?)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Request body for `POST /api/seen/status`.
#[derive(Debug, Deserialize)]
pub struct SeenStatusRequest {
    pub broker_id: String,
    pub entry_ids: Vec<String>,
}

/// Handler for `POST /api/seen/status`.
pub async fn seen_status_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<SeenStatusRequest>,
) -> Result<Json<HashMap<String, bool>>, ApiError> {
    let status = with_conn(&state.pool, move |conn| {
        Ok(seen_status(conn, &payload.broker_id, &payload.entry_ids)?)
    })
    .await?;
    Ok(Json(status))
}

/// Query parameters for `GET /api/clients/{clientId}/feed`.
#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    /// Maximum entries to return (default: 50, max: 500).
    pub limit: Option<i64>,
}

/// Handler for `GET /api/clients/{clientId}/feed`.
pub async fn client_feed_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(client_id): Path<String>,
    Query(params): Query<FeedQuery>,
) -> Result<Json<Vec<TimelineItem>>, ApiError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);

    let entries =
        with_conn(&state.pool, move |conn| Ok(list_client_feed(conn, &client_id, limit)?)).await?;
    Ok(Json(render_timeline(entries, state.directory.as_ref())))
}
