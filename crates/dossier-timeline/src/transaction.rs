//! The transaction registry the timeline hangs off.
//!
//! Only the fields the timeline and appointment flows need are kept here:
//! who the broker and client are, the property address and the current
//! pipeline stage. Opening a transaction and changing its stage both write
//! their timeline entry in the same unit as the row change.

use dossier_types::timestamp;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::TimelineError;
use crate::event::{NewTimelineEntry, TimelineEntry, TimelineEvent};
use crate::store::append_entry;

/// A brokerage transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub broker_id: String,
    pub client_id: String,
    pub address: Option<String>,
    pub stage: String,
    pub created_at: String,
}

/// Parameters for opening a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub transaction_id: String,
    pub broker_id: String,
    pub client_id: String,
    pub address: Option<String>,
    pub stage: String,
    /// Rendered into the CREATED entry; not stored on the transaction.
    pub client_name: Option<String>,
}

/// Registers a transaction and appends its client-visible CREATED entry.
///
/// # Errors
///
/// Returns `TimelineError::TransactionExists` if the id is taken,
/// `TimelineError::Database` on SQL failure.
pub fn open_transaction(
    conn: &Connection,
    params: &NewTransaction,
) -> Result<(Transaction, TimelineEntry), TimelineError> {
    dossier_db::atomically(conn, |conn| {
        let created_at = timestamp::now();
        let inserted = conn.execute(
            "INSERT INTO transactions
                (transaction_id, broker_id, client_id, address, stage, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (transaction_id) DO NOTHING",
            params![
                params.transaction_id,
                params.broker_id,
                params.client_id,
                params.address,
                params.stage,
                created_at,
            ],
        )?;
        if inserted == 0 {
            return Err(TimelineError::TransactionExists(
                params.transaction_id.clone(),
            ));
        }

        let entry = append_entry(
            conn,
            &NewTimelineEntry::new(
                &params.transaction_id,
                TimelineEvent::Created {
                    client_name: params.client_name.clone(),
                    address: params.address.clone(),
                },
            )
            .by(&params.broker_id)
            .visible_to_client(true),
        )?;

        tracing::info!(transaction_id = %params.transaction_id, "opened transaction");

        Ok((
            Transaction {
                transaction_id: params.transaction_id.clone(),
                broker_id: params.broker_id.clone(),
                client_id: params.client_id.clone(),
                address: params.address.clone(),
                stage: params.stage.clone(),
                created_at,
            },
            entry,
        ))
    })
}

/// Retrieves a transaction by id.
///
/// # Errors
///
/// Returns `TimelineError::TransactionNotFound` if it does not exist.
pub fn get_transaction(conn: &Connection, transaction_id: &str) -> Result<Transaction, TimelineError> {
    conn.query_row(
        "SELECT transaction_id, broker_id, client_id, address, stage, created_at
         FROM transactions WHERE transaction_id = ?1",
        [transaction_id],
        |row| {
            Ok(Transaction {
                transaction_id: row.get(0)?,
                broker_id: row.get(1)?,
                client_id: row.get(2)?,
                address: row.get(3)?,
                stage: row.get(4)?,
                created_at: row.get(5)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| TimelineError::TransactionNotFound(transaction_id.to_string()))
}

/// Moves a transaction to `new_stage` and records a STAGE_CHANGE entry.
///
/// # Errors
///
/// Returns `TimelineError::TransactionNotFound` if it does not exist.
pub fn change_stage(
    conn: &Connection,
    transaction_id: &str,
    actor_id: &str,
    new_stage: &str,
    reason: Option<&str>,
    visible_to_client: bool,
) -> Result<TimelineEntry, TimelineError> {
    dossier_db::atomically(conn, |conn| {
        let current = get_transaction(conn, transaction_id)?;
        conn.execute(
            "UPDATE transactions SET stage = ?1 WHERE transaction_id = ?2",
            params![new_stage, transaction_id],
        )?;

        append_entry(
            conn,
            &NewTimelineEntry::new(
                transaction_id,
                TimelineEvent::StageChange {
                    previous_stage: Some(current.stage),
                    new_stage: new_stage.to_string(),
                    reason: reason.map(str::to_string),
                },
            )
            .by(actor_id)
            .visible_to_client(visible_to_client),
        )
    })
}

pub(crate) fn ensure_transaction(conn: &Connection, transaction_id: &str) -> Result<(), TimelineError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM transactions WHERE transaction_id = ?1)",
        [transaction_id],
        |row| row.get(0),
    )?;
    if exists {
        Ok(())
    } else {
        Err(TimelineError::TransactionNotFound(transaction_id.to_string()))
    }
}
