//! Persistence for appointment rows.
//!
//! Rows are only ever written whole: [`update_appointment`] replaces every
//! mutable column at once and succeeds only if the row still carries the
//! version the caller read.

use chrono::NaiveDateTime;
use dossier_audit::{query_audit, AuditFilter};
use dossier_types::timestamp;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::AppointmentError;
use crate::model::{Appointment, AppointmentAuditRecord, Coordinates};

const APPOINTMENT_COLUMNS: &str = "appointment_id, transaction_id, broker_id, client_id, title,
    from_date_time, to_date_time, status, initiated_by, location, latitude, longitude, notes,
    property_id, visitor_id, refusal_reason, cancellation_reason, cancelled_by, version,
    created_at, updated_at";

const SLOT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Upper bound on the audit records returned for one appointment.
pub(crate) const HISTORY_LIMIT: i64 = 1_000;

pub(crate) fn insert_appointment(conn: &Connection, a: &Appointment) -> Result<(), AppointmentError> {
    conn.execute(
        &format!(
            "INSERT INTO appointments ({APPOINTMENT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                     ?16, ?17, ?18, ?19, ?20, ?21)"
        ),
        params![
            a.id,
            a.transaction_id,
            a.broker_id,
            a.client_id,
            a.title,
            format_slot(a.from_date_time),
            format_slot(a.to_date_time),
            a.status.as_str(),
            a.initiated_by.as_str(),
            a.location,
            a.coordinates.map(|c| c.latitude),
            a.coordinates.map(|c| c.longitude),
            a.notes,
            a.property_id,
            a.visitor_id,
            a.refusal_reason,
            a.cancellation_reason,
            a.cancelled_by,
            a.version,
            timestamp::format(a.created_at),
            timestamp::format(a.updated_at),
        ],
    )?;
    Ok(())
}

/// Writes `a` over the stored row if that row is still at `expected_version`.
///
/// Returns `false` when the row has moved on; nothing is written then.
pub(crate) fn update_appointment(
    conn: &Connection,
    a: &Appointment,
    expected_version: i64,
) -> Result<bool, AppointmentError> {
    let updated = conn.execute(
        "UPDATE appointments SET
            title = ?1, from_date_time = ?2, to_date_time = ?3, status = ?4,
            initiated_by = ?5, location = ?6, latitude = ?7, longitude = ?8, notes = ?9,
            refusal_reason = ?10, cancellation_reason = ?11, cancelled_by = ?12,
            version = ?13, updated_at = ?14
         WHERE appointment_id = ?15 AND version = ?16",
        params![
            a.title,
            format_slot(a.from_date_time),
            format_slot(a.to_date_time),
            a.status.as_str(),
            a.initiated_by.as_str(),
            a.location,
            a.coordinates.map(|c| c.latitude),
            a.coordinates.map(|c| c.longitude),
            a.notes,
            a.refusal_reason,
            a.cancellation_reason,
            a.cancelled_by,
            a.version,
            timestamp::format(a.updated_at),
            a.id,
            expected_version,
        ],
    )?;
    Ok(updated == 1)
}

/// Retrieves an appointment by id.
///
/// # Errors
///
/// Returns `AppointmentError::NotFound` if it does not exist.
pub fn get_appointment(conn: &Connection, appointment_id: &str) -> Result<Appointment, AppointmentError> {
    conn.query_row(
        &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE appointment_id = ?1"),
        [appointment_id],
        map_row_to_appointment,
    )
    .optional()?
    .ok_or_else(|| AppointmentError::NotFound {
        entity: "appointment",
        id: appointment_id.to_string(),
    })
}

/// Lists a transaction's appointments by start time.
///
/// # Errors
///
/// Returns `AppointmentError::Database` on SQL failure.
pub fn list_appointments(
    conn: &Connection,
    transaction_id: &str,
) -> Result<Vec<Appointment>, AppointmentError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE transaction_id = ?1
         ORDER BY from_date_time ASC, created_at ASC"
    ))?;
    let rows = stmt.query_map([transaction_id], map_row_to_appointment)?;

    let mut appointments = Vec::new();
    for row in rows {
        appointments.push(row?);
    }
    Ok(appointments)
}

/// Returns the audit history of an appointment, oldest first.
///
/// At most the first 1000 records are returned; anything recorded after
/// that is left out.
///
/// # Errors
///
/// Returns `AppointmentError::NotFound` if the appointment does not exist,
/// `AppointmentError::Internal` if the trail cannot be read or holds an
/// action this crate does not know.
pub fn appointment_history(
    conn: &Connection,
    appointment_id: &str,
) -> Result<Vec<AppointmentAuditRecord>, AppointmentError> {
    get_appointment(conn, appointment_id)?;

    let records = query_audit(
        conn,
        &AuditFilter {
            subject_id: Some(appointment_id.to_string()),
            limit: Some(HISTORY_LIMIT),
            ..Default::default()
        },
    )
    .map_err(|e| AppointmentError::Internal(e.to_string()))?;

    records
        .into_iter()
        .map(|record| {
            let action = record
                .action
                .parse()
                .map_err(|e: crate::machine::ParseLabelError| {
                    AppointmentError::Internal(e.to_string())
                })?;
            Ok(AppointmentAuditRecord {
                appointment_id: record.subject_id,
                action,
                performed_by: record.performed_by,
                performed_at: record.performed_at,
                details: record.details,
            })
        })
        .collect()
}

fn format_slot(at: NaiveDateTime) -> String {
    at.format(SLOT_FORMAT).to_string()
}

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

fn map_row_to_appointment(row: &Row) -> rusqlite::Result<Appointment> {
    let slot = |idx: usize| -> rusqlite::Result<NaiveDateTime> {
        let raw: String = row.get(idx)?;
        NaiveDateTime::parse_from_str(&raw, SLOT_FORMAT).map_err(|e| conversion_error(idx, e))
    };
    let instant = |idx: usize| -> rusqlite::Result<chrono::DateTime<chrono::Utc>> {
        let raw: String = row.get(idx)?;
        timestamp::parse(&raw).map_err(|e| conversion_error(idx, e))
    };

    let status: String = row.get(7)?;
    let initiated_by: String = row.get(8)?;
    let latitude: Option<f64> = row.get(10)?;
    let longitude: Option<f64> = row.get(11)?;

    Ok(Appointment {
        id: row.get(0)?,
        transaction_id: row.get(1)?,
        broker_id: row.get(2)?,
        client_id: row.get(3)?,
        title: row.get(4)?,
        from_date_time: slot(5)?,
        to_date_time: slot(6)?,
        status: status.parse().map_err(|e| conversion_error(7, e))?,
        initiated_by: initiated_by.parse().map_err(|e| conversion_error(8, e))?,
        location: row.get(9)?,
        coordinates: latitude
            .zip(longitude)
            .map(|(latitude, longitude)| Coordinates {
                latitude,
                longitude,
            }),
        notes: row.get(12)?,
        property_id: row.get(13)?,
        visitor_id: row.get(14)?,
        refusal_reason: row.get(15)?,
        cancellation_reason: row.get(16)?,
        cancelled_by: row.get(17)?,
        version: row.get(18)?,
        created_at: instant(19)?,
        updated_at: instant(20)?,
    })
}
