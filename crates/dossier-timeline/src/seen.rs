//! Per-broker read markers over the timeline.
//!
//! A marker says broker `B` has seen entry `E`. The `(broker_id,
//! timeline_entry_id)` primary key is the only thing that keeps markers
//! unique: a second mark of the same pair, concurrent or not, is absorbed by
//! `ON CONFLICT DO NOTHING` and never surfaces as an error.
//!
//! Seen-state is an annotation, not a source of truth. Unknown entry ids are
//! reported as "not seen" and marking them is a no-op.

use std::collections::{HashMap, HashSet};

use dossier_types::timestamp;
use rusqlite::{params, Connection};

use crate::error::TimelineError;

/// Marks `entry_id` as seen by `broker_id`. Idempotent.
///
/// # Errors
///
/// Returns `TimelineError::Database` on SQL failure.
pub fn mark_seen(conn: &Connection, broker_id: &str, entry_id: &str) -> Result<(), TimelineError> {
    let inserted = conn.execute(
        "INSERT INTO seen_markers (broker_id, timeline_entry_id, seen_at)
         SELECT ?1, ?2, ?3
         WHERE EXISTS (SELECT 1 FROM timeline_entries WHERE id = ?2)
         ON CONFLICT (broker_id, timeline_entry_id) DO NOTHING",
        params![broker_id, entry_id, timestamp::now()],
    )?;

    if inserted == 0 {
        tracing::debug!(broker_id, entry_id, "entry already seen or unknown");
    }
    Ok(())
}

/// Marks every entry of a transaction as seen by `broker_id`.
///
/// Returns the number of markers created by this call.
///
/// # Errors
///
/// Returns `TimelineError::Database` on SQL failure.
pub fn mark_all_seen(
    conn: &Connection,
    broker_id: &str,
    transaction_id: &str,
) -> Result<usize, TimelineError> {
    let inserted = conn.execute(
        "INSERT INTO seen_markers (broker_id, timeline_entry_id, seen_at)
         SELECT ?1, id, ?3 FROM timeline_entries WHERE transaction_id = ?2
         ON CONFLICT (broker_id, timeline_entry_id) DO NOTHING",
        params![broker_id, transaction_id, timestamp::now()],
    )?;
    Ok(inserted)
}

/// Returns whether `broker_id` has seen `entry_id`.
///
/// # Errors
///
/// Returns `TimelineError::Database` on SQL failure.
pub fn is_seen(conn: &Connection, broker_id: &str, entry_id: &str) -> Result<bool, TimelineError> {
    let seen = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM seen_markers WHERE broker_id = ?1 AND timeline_entry_id = ?2
         )",
        params![broker_id, entry_id],
        |row| row.get(0),
    )?;
    Ok(seen)
}

/// Resolves the seen flag of many entries in one query.
///
/// The ids are passed as a single JSON array and expanded with `json_each`,
/// so the lookup is one round-trip however many ids are asked about. Every
/// requested id appears in the result.
///
/// # Errors
///
/// Returns `TimelineError::Database` on SQL failure.
pub fn seen_status<S: AsRef<str>>(
    conn: &Connection,
    broker_id: &str,
    entry_ids: &[S],
) -> Result<HashMap<String, bool>, TimelineError> {
    if entry_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let ids: Vec<&str> = entry_ids.iter().map(|id| id.as_ref()).collect();
    let ids_json = serde_json::to_string(&ids)?;

    let mut stmt = conn.prepare(
        "SELECT timeline_entry_id FROM seen_markers
         WHERE broker_id = ?1
           AND timeline_entry_id IN (SELECT value FROM json_each(?2))",
    )?;
    let rows = stmt.query_map(params![broker_id, ids_json], |row| row.get::<_, String>(0))?;

    let mut seen = HashSet::new();
    for row in rows {
        seen.insert(row?);
    }

    Ok(ids
        .into_iter()
        .map(|id| (id.to_string(), seen.contains(id)))
        .collect())
}

/// Counts the entries of a transaction `broker_id` has not seen yet.
///
/// # Errors
///
/// Returns `TimelineError::Database` on SQL failure.
pub fn unseen_count(
    conn: &Connection,
    broker_id: &str,
    transaction_id: &str,
) -> Result<i64, TimelineError> {
    let count = conn.query_row(
        "SELECT COUNT(*)
         FROM timeline_entries e
         LEFT JOIN seen_markers m
           ON m.timeline_entry_id = e.id AND m.broker_id = ?1
         WHERE e.transaction_id = ?2 AND m.timeline_entry_id IS NULL",
        params![broker_id, transaction_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Unseen counts for every transaction the broker handles, keyed by
/// transaction id. Transactions with nothing unseen are omitted.
///
/// # Errors
///
/// Returns `TimelineError::Database` on SQL failure.
pub fn unseen_counts(
    conn: &Connection,
    broker_id: &str,
) -> Result<HashMap<String, i64>, TimelineError> {
    let mut stmt = conn.prepare(
        "SELECT e.transaction_id, COUNT(*)
         FROM timeline_entries e
         JOIN transactions t ON t.transaction_id = e.transaction_id
         LEFT JOIN seen_markers m
           ON m.timeline_entry_id = e.id AND m.broker_id = ?1
         WHERE t.broker_id = ?1 AND m.timeline_entry_id IS NULL
         GROUP BY e.transaction_id",
    )?;
    let rows = stmt.query_map([broker_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut counts = HashMap::new();
    for row in rows {
        let (transaction_id, count) = row?;
        counts.insert(transaction_id, count);
    }
    Ok(counts)
}

/// Removes every marker of `broker_id`. Returns how many were removed.
///
/// # Errors
///
/// Returns `TimelineError::Database` on SQL failure.
pub fn clear_seen(conn: &Connection, broker_id: &str) -> Result<usize, TimelineError> {
    let removed = conn.execute("DELETE FROM seen_markers WHERE broker_id = ?1", [broker_id])?;
    tracing::info!(broker_id, removed, "cleared seen markers");
    Ok(removed)
}
