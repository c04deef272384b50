//! Appointment records and the inputs that create and change them.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use dossier_types::Role;
use serde::{Deserialize, Serialize};

use crate::error::AppointmentError;
use crate::machine::{AppointmentAction, AppointmentStatus, Transition};

/// A point on the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A broker/client meeting and where its negotiation stands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub transaction_id: String,
    pub broker_id: String,
    pub client_id: String,
    pub title: String,
    pub from_date_time: NaiveDateTime,
    /// Strictly after `from_date_time`.
    pub to_date_time: NaiveDateTime,
    pub status: AppointmentStatus,
    /// The side whose proposal is currently on the table.
    pub initiated_by: Role,
    pub location: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub notes: Option<String>,
    pub property_id: Option<String>,
    pub visitor_id: Option<String>,
    /// Set only when DECLINED.
    pub refusal_reason: Option<String>,
    /// Set only when CANCELLED, together with `cancelled_by`.
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<String>,
    /// Bumped on every committed change.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// The role `actor_id` plays in this appointment, if any.
    pub fn role_of(&self, actor_id: &str) -> Option<Role> {
        if actor_id == self.broker_id {
            Some(Role::Broker)
        } else if actor_id == self.client_id {
            Some(Role::Client)
        } else {
            None
        }
    }

    /// The participant id holding `role`.
    pub fn participant(&self, role: Role) -> &str {
        match role {
            Role::Broker => &self.broker_id,
            Role::Client => &self.client_id,
        }
    }
}

/// Parameters for requesting an appointment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentRequest {
    pub transaction_id: String,
    pub requester_id: String,
    pub requester_role: Role,
    pub title: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// Stored as the appointment's notes.
    pub message: Option<String>,
    pub property_id: Option<String>,
    pub visitor_id: Option<String>,
    pub location: Option<String>,
    pub coordinates: Option<Coordinates>,
}

/// A counterparty's answer to the proposal on the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewAction {
    Confirm,
    Decline {
        refusal_reason: String,
    },
    Reschedule {
        new_date: NaiveDate,
        new_start_time: NaiveTime,
        new_end_time: NaiveTime,
    },
}

impl ReviewAction {
    pub fn transition(&self) -> Transition {
        match self {
            Self::Confirm => Transition::Confirm,
            Self::Decline { .. } => Transition::Decline,
            Self::Reschedule { .. } => Transition::Reschedule,
        }
    }
}

/// One audit fact from an appointment's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentAuditRecord {
    pub appointment_id: String,
    pub action: AppointmentAction,
    pub performed_by: Option<String>,
    pub performed_at: DateTime<Utc>,
    pub details: Option<String>,
}

/// Builds a time window on `date`, rejecting empty or inverted ones.
pub(crate) fn time_window(
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
) -> Result<(NaiveDateTime, NaiveDateTime), AppointmentError> {
    if end <= start {
        return Err(AppointmentError::Validation(format!(
            "end time {end} must be after start time {start}"
        )));
    }
    Ok((date.and_time(start), date.and_time(end)))
}

/// Returns the trimmed text, or a validation error naming `field`.
pub(crate) fn required_text<'a>(field: &str, value: &'a str) -> Result<&'a str, AppointmentError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppointmentError::Validation(format!("{field} is required")));
    }
    Ok(trimmed)
}
