//! The notification seam.
//!
//! The engine emits exactly one [`AppointmentNotification`] per committed
//! transition and none for a failed one. Delivery (email, push) belongs to
//! whatever implements [`NotificationDispatcher`]; it is fire-and-forget and
//! cannot fail the transition that caused it.

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Which transition a notification announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    #[serde(rename = "APPOINTMENT_REQUESTED")]
    Requested,
    #[serde(rename = "APPOINTMENT_CONFIRMED")]
    Confirmed,
    #[serde(rename = "APPOINTMENT_REJECTED")]
    Rejected,
    #[serde(rename = "APPOINTMENT_CANCELLED")]
    Cancelled,
    #[serde(rename = "APPOINTMENT_RESCHEDULED")]
    Rescheduled,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "APPOINTMENT_REQUESTED",
            Self::Confirmed => "APPOINTMENT_CONFIRMED",
            Self::Rejected => "APPOINTMENT_REJECTED",
            Self::Cancelled => "APPOINTMENT_CANCELLED",
            Self::Rescheduled => "APPOINTMENT_RESCHEDULED",
        }
    }
}

/// A committed appointment transition, addressed to the other participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentNotification {
    pub kind: NotificationKind,
    pub appointment_id: String,
    pub transaction_id: String,
    /// Who caused the transition.
    pub actor_id: String,
    /// Who should hear about it.
    pub recipient_id: String,
    pub title: String,
    pub from_date_time: NaiveDateTime,
}

/// Receives notifications after their transition has committed.
pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, notification: AppointmentNotification);
}

impl<D: NotificationDispatcher + ?Sized> NotificationDispatcher for Arc<D> {
    fn dispatch(&self, notification: AppointmentNotification) {
        (**self).dispatch(notification)
    }
}

/// Drops every notification after logging it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOnlyDispatcher;

impl NotificationDispatcher for LogOnlyDispatcher {
    fn dispatch(&self, notification: AppointmentNotification) {
        tracing::info!(
            kind = notification.kind.as_str(),
            appointment_id = %notification.appointment_id,
            recipient_id = %notification.recipient_id,
            "appointment notification (not delivered)"
        );
    }
}
