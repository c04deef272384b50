//! Persistence operations for the transaction timeline.
//!
//! All writes go through [`append_entry`], which assigns the next sequence
//! number and a non-decreasing `occurred_at` for the transaction and inserts
//! the row in a single statement. Nothing in this module updates or deletes
//! an entry; the schema rejects both.
//!
//! Reads re-derive the full order from the table on every call, so any
//! consumer can be rebuilt by replaying a transaction's entries.

use chrono::{DateTime, Utc};
use dossier_types::timestamp;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::TimelineError;
use crate::event::{Audience, NewTimelineEntry, SortOrder, TimelineEntry, TimelineEvent};
use crate::transaction::ensure_transaction;

const ENTRY_COLUMNS: &str =
    "id, transaction_id, seq, actor_id, note, visible_to_client, occurred_at, payload_json";

/// Appends an entry to its transaction's timeline, stamped with the current time.
///
/// # Errors
///
/// Returns `TimelineError::TransactionNotFound` if the transaction is not
/// registered, `TimelineError::Database` on SQL failure.
pub fn append_entry(
    conn: &Connection,
    entry: &NewTimelineEntry,
) -> Result<TimelineEntry, TimelineError> {
    append_entry_at(conn, entry, Utc::now())
}

/// Appends an entry using `now` as the wall-clock reading.
///
/// The stored `occurred_at` is `now`, raised to the latest timestamp already
/// in the transaction when the clock reads behind it, so timestamps never
/// decrease in insertion order.
///
/// # Errors
///
/// See [`append_entry`].
pub fn append_entry_at(
    conn: &Connection,
    entry: &NewTimelineEntry,
    now: DateTime<Utc>,
) -> Result<TimelineEntry, TimelineError> {
    let payload_json = serde_json::to_string(&entry.event)?;
    let entry_type = entry.event.entry_type();
    let id = uuid::Uuid::new_v4().to_string();
    let now = timestamp::format(now);

    let (seq, occurred_at) = dossier_db::atomically(conn, |conn| {
        ensure_transaction(conn, &entry.transaction_id)?;

        // Sequence and timestamp are derived inside the INSERT itself, under
        // the write lock taken by the enclosing unit.
        let row = conn.query_row(
            "INSERT INTO timeline_entries
                (id, transaction_id, seq, actor_id, entry_type, note, doc_type,
                 visible_to_client, payload_json, occurred_at)
             VALUES (
                ?1, ?2,
                (SELECT COALESCE(MAX(seq), 0) + 1 FROM timeline_entries WHERE transaction_id = ?2),
                ?3, ?4, ?5, ?6, ?7, ?8,
                (SELECT max(?9, COALESCE(MAX(occurred_at), ?9))
                   FROM timeline_entries WHERE transaction_id = ?2)
             )
             RETURNING seq, occurred_at",
            params![
                id,
                entry.transaction_id,
                entry.actor_id,
                entry_type.as_str(),
                entry.note,
                entry.event.doc_type(),
                entry.visible_to_client,
                payload_json,
                now,
            ],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
        )?;
        Ok::<_, TimelineError>(row)
    })?;

    tracing::debug!(
        transaction_id = %entry.transaction_id,
        entry_id = %id,
        entry_type = entry_type.as_str(),
        seq,
        "appended timeline entry"
    );

    Ok(TimelineEntry {
        id,
        transaction_id: entry.transaction_id.clone(),
        seq,
        actor_id: entry.actor_id.clone(),
        note: entry.note.clone(),
        visible_to_client: entry.visible_to_client,
        occurred_at: parse_occurred_at(&occurred_at, 1)?,
        event: entry.event.clone(),
    })
}

/// Fetches a single entry by id.
///
/// # Errors
///
/// Returns `TimelineError::Database` on SQL failure.
pub fn get_entry(conn: &Connection, entry_id: &str) -> Result<Option<TimelineEntry>, TimelineError> {
    let entry = conn
        .query_row(
            &format!("SELECT {ENTRY_COLUMNS} FROM timeline_entries WHERE id = ?1"),
            [entry_id],
            map_row_to_entry,
        )
        .optional()?;
    Ok(entry)
}

/// Lists a transaction's timeline for the given audience.
///
/// The broker view contains every entry; the client view only those flagged
/// `visible_to_client`. Entries are ordered by their position in the
/// transaction, oldest or newest first.
///
/// # Errors
///
/// Returns `TimelineError::TransactionNotFound` if the transaction is not
/// registered, `TimelineError::Database` on SQL failure.
pub fn list_for_transaction(
    conn: &Connection,
    transaction_id: &str,
    audience: Audience,
    order: SortOrder,
) -> Result<Vec<TimelineEntry>, TimelineError> {
    ensure_transaction(conn, transaction_id)?;

    let direction = match order {
        SortOrder::OldestFirst => "ASC",
        SortOrder::NewestFirst => "DESC",
    };
    let client_only = audience == Audience::Client;

    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS}
         FROM timeline_entries
         WHERE transaction_id = ?1 AND (?2 = 0 OR visible_to_client = 1)
         ORDER BY seq {direction}"
    ))?;
    let rows = stmt.query_map(params![transaction_id, client_only], map_row_to_entry)?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

/// Lists the client-visible entries across every transaction of a client,
/// newest first, bounded by `limit`.
///
/// # Errors
///
/// Returns `TimelineError::Database` on SQL failure.
pub fn list_client_feed(
    conn: &Connection,
    client_id: &str,
    limit: i64,
) -> Result<Vec<TimelineEntry>, TimelineError> {
    let mut stmt = conn.prepare(
        "SELECT e.id, e.transaction_id, e.seq, e.actor_id, e.note, e.visible_to_client,
                e.occurred_at, e.payload_json
         FROM timeline_entries e
         JOIN transactions t ON t.transaction_id = e.transaction_id
         WHERE t.client_id = ?1 AND e.visible_to_client = 1
         ORDER BY e.occurred_at DESC, e.seq DESC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![client_id, limit], map_row_to_entry)?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

fn parse_occurred_at(raw: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    timestamp::parse(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn map_row_to_entry(row: &Row) -> rusqlite::Result<TimelineEntry> {
    let occurred_at: String = row.get(6)?;
    let payload_json: String = row.get(7)?;
    let event: TimelineEvent = serde_json::from_str(&payload_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(TimelineEntry {
        id: row.get(0)?,
        transaction_id: row.get(1)?,
        seq: row.get(2)?,
        actor_id: row.get(3)?,
        note: row.get(4)?,
        visible_to_client: row.get(5)?,
        occurred_at: parse_occurred_at(&occurred_at, 6)?,
        event,
    })
}
