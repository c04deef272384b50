//! The appointment state machine.
//!
//! ```text
//!              CONFIRM            CANCEL
//!   PROPOSED ───────────▶ CONFIRMED ───────▶ CANCELLED
//!     │  ▲ RESCHEDULE                          ▲
//!     │  └──────┘                              │
//!     ├── DECLINE ──▶ DECLINED                 │
//!     └── CANCEL ──────────────────────────────┘
//! ```
//!
//! [`next_status`] is the whole table; every other check in the engine is
//! about who may act and with which fields, never about which states
//! connect.

use serde::{Deserialize, Serialize};

use crate::notify::NotificationKind;

/// Current state of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    /// Awaiting the counterparty's review.
    Proposed,
    Confirmed,
    /// Terminal.
    Declined,
    /// Terminal.
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [Self; 4] = [
        Self::Proposed,
        Self::Confirmed,
        Self::Declined,
        Self::Cancelled,
    ];

    /// Returns the canonical string label for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Proposed => "PROPOSED",
            Self::Confirmed => "CONFIRMED",
            Self::Declined => "DECLINED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Whether no transition leaves this state.
    pub fn is_terminal(self) -> bool {
        Transition::ALL
            .into_iter()
            .all(|t| next_status(self, t).is_none())
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AppointmentStatus {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseLabelError(s.to_string()))
    }
}

/// Something a participant can do to an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Transition {
    Confirm,
    Decline,
    Reschedule,
    Cancel,
}

impl Transition {
    pub const ALL: [Self; 4] = [Self::Confirm, Self::Decline, Self::Reschedule, Self::Cancel];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confirm => "CONFIRM",
            Self::Decline => "DECLINE",
            Self::Reschedule => "RESCHEDULE",
            Self::Cancel => "CANCEL",
        }
    }

    /// The audit action recorded when this transition succeeds.
    pub fn audit_action(self) -> AppointmentAction {
        match self {
            Self::Confirm => AppointmentAction::Confirmed,
            Self::Decline => AppointmentAction::Declined,
            Self::Reschedule => AppointmentAction::Rescheduled,
            Self::Cancel => AppointmentAction::Cancelled,
        }
    }

    /// The notification sent to the other participant when this transition
    /// succeeds.
    pub fn notification_kind(self) -> NotificationKind {
        match self {
            Self::Confirm => NotificationKind::Confirmed,
            Self::Decline => NotificationKind::Rejected,
            Self::Reschedule => NotificationKind::Rescheduled,
            Self::Cancel => NotificationKind::Cancelled,
        }
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The transition table: where `transition` leads from `from`, if anywhere.
pub fn next_status(from: AppointmentStatus, transition: Transition) -> Option<AppointmentStatus> {
    use AppointmentStatus::*;
    use Transition::*;

    match (from, transition) {
        (Proposed, Confirm) => Some(Confirmed),
        (Proposed, Decline) => Some(Declined),
        (Proposed, Reschedule) => Some(Proposed),
        (Proposed | Confirmed, Cancel) => Some(Cancelled),
        (Proposed | Confirmed | Declined | Cancelled, _) => None,
    }
}

/// Audit actions recorded against an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentAction {
    Created,
    Confirmed,
    Declined,
    Rescheduled,
    Cancelled,
}

impl AppointmentAction {
    pub const ALL: [Self; 5] = [
        Self::Created,
        Self::Confirmed,
        Self::Declined,
        Self::Rescheduled,
        Self::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Confirmed => "CONFIRMED",
            Self::Declined => "DECLINED",
            Self::Rescheduled => "RESCHEDULED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for AppointmentAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AppointmentAction {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| ParseLabelError(s.to_string()))
    }
}

/// Error returned when a stored label matches no known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown label: {0}")]
pub struct ParseLabelError(pub String);
