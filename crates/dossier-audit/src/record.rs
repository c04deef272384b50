//! Audit record types.

use chrono::{DateTime, Utc};
use dossier_types::timestamp;
use serde::{Deserialize, Serialize};

/// An immutable fact: who did what to which subject, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Auto-incremented row ID.
    pub id: i64,
    /// What the fact is about: an appointment id, a user id, a settings key.
    pub subject_id: String,
    /// Upper-case action label, e.g. `CONFIRMED` or `LOGOUT`.
    pub action: String,
    /// `None` for system actions.
    pub performed_by: Option<String>,
    pub performed_at: DateTime<Utc>,
    pub details: Option<String>,
}

/// A fact to append to the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAuditRecord {
    pub subject_id: String,
    pub action: String,
    pub performed_by: Option<String>,
    pub performed_at: DateTime<Utc>,
    pub details: Option<String>,
}

impl NewAuditRecord {
    /// A record of `action` on `subject_id`, performed now.
    pub fn now(subject_id: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            action: action.into(),
            performed_by: None,
            performed_at: timestamp::stored_now(),
            details: None,
        }
    }

    pub fn by(mut self, performed_by: impl Into<String>) -> Self {
        self.performed_by = Some(performed_by.into());
        self
    }

    pub fn at(mut self, performed_at: DateTime<Utc>) -> Self {
        self.performed_at = performed_at;
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}
