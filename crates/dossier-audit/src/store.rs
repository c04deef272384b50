//! Persistence operations for the audit trail.
//!
//! [`append_record`] is the fallible primitive: callers that must commit a
//! fact together with the change it describes run it inside their own unit
//! and let its error abort that unit. Callers recording side facts go
//! through an [`AuditSink`](crate::AuditSink) instead.

use chrono::{DateTime, SubsecRound, Utc};
use dossier_types::timestamp;
use rusqlite::{params, Connection, Row};

use crate::error::AuditError;
use crate::record::{AuditRecord, NewAuditRecord};

/// Appends a record to the audit trail.
///
/// `performed_at` is kept at storage precision, so the returned record is
/// exactly what later reads produce.
///
/// # Errors
///
/// Returns `AuditError::Database` on SQL failure.
pub fn append_record(conn: &Connection, record: &NewAuditRecord) -> Result<AuditRecord, AuditError> {
    let performed_at = record.performed_at.trunc_subsecs(6);
    let id = conn.query_row(
        "INSERT INTO audit_log (subject_id, action, performed_by, performed_at, details)
         VALUES (?1, ?2, ?3, ?4, ?5)
         RETURNING id",
        params![
            record.subject_id,
            record.action,
            record.performed_by,
            timestamp::format(performed_at),
            record.details,
        ],
        |row| row.get(0),
    )?;

    tracing::debug!(
        subject_id = %record.subject_id,
        action = %record.action,
        id,
        "appended audit record"
    );

    Ok(AuditRecord {
        id,
        subject_id: record.subject_id.clone(),
        action: record.action.clone(),
        performed_by: record.performed_by.clone(),
        performed_at,
        details: record.details.clone(),
    })
}

/// Filter criteria for querying the audit trail.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    /// Only records about this subject.
    pub subject_id: Option<String>,
    /// Only records performed at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Only records performed strictly before this instant.
    pub until: Option<DateTime<Utc>>,
    /// Maximum number of records to return (default: 100).
    pub limit: Option<i64>,
}

/// Queries the audit trail, oldest first.
///
/// # Errors
///
/// Returns `AuditError::Database` on SQL failure.
pub fn query_audit(conn: &Connection, filter: &AuditFilter) -> Result<Vec<AuditRecord>, AuditError> {
    let mut clauses: Vec<String> = Vec::new();
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    let mut idx = 1u32;

    if let Some(ref subject_id) = filter.subject_id {
        clauses.push(format!("subject_id = ?{idx}"));
        param_values.push(Box::new(subject_id.clone()));
        idx += 1;
    }

    if let Some(since) = filter.since {
        clauses.push(format!("performed_at >= ?{idx}"));
        param_values.push(Box::new(timestamp::format(since)));
        idx += 1;
    }

    if let Some(until) = filter.until {
        clauses.push(format!("performed_at < ?{idx}"));
        param_values.push(Box::new(timestamp::format(until)));
        idx += 1;
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let sql = format!(
        "SELECT id, subject_id, action, performed_by, performed_at, details
         FROM audit_log
         {where_clause}
         ORDER BY performed_at ASC, id ASC
         LIMIT ?{idx}"
    );
    param_values.push(Box::new(filter.limit.unwrap_or(100)));

    let params_refs: Vec<&dyn rusqlite::types::ToSql> = param_values.iter().map(|p| &**p).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_refs.as_slice(), map_row_to_record)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

/// Returns the `limit` most recent records, newest first.
///
/// # Errors
///
/// Returns `AuditError::Database` on SQL failure.
pub fn recent_audit(conn: &Connection, limit: i64) -> Result<Vec<AuditRecord>, AuditError> {
    let mut stmt = conn.prepare(
        "SELECT id, subject_id, action, performed_by, performed_at, details
         FROM audit_log
         ORDER BY performed_at DESC, id DESC
         LIMIT ?1",
    )?;
    let rows = stmt.query_map([limit], map_row_to_record)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

fn map_row_to_record(row: &Row) -> rusqlite::Result<AuditRecord> {
    let performed_at: String = row.get(4)?;
    let performed_at = timestamp::parse(&performed_at).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(AuditRecord {
        id: row.get(0)?,
        subject_id: row.get(1)?,
        action: row.get(2)?,
        performed_by: row.get(3)?,
        performed_at,
        details: row.get(5)?,
    })
}
