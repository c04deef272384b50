//! Timeline entry types, payloads, and records.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// The closed set of timeline entry types.
///
/// The type of an entry is never stored independently of its payload: it is
/// derived from the [`TimelineEvent`] variant, so an entry cannot carry a
/// payload that belongs to another category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimelineEntryType {
    Created,
    StageChange,
    Note,
    TransactionNote,
    DocumentRequested,
    DocumentSubmitted,
    DocumentApproved,
    DocumentNeedsRevision,
    StatusChange,
    PropertyAdded,
    PropertyUpdated,
    PropertyRemoved,
    OfferReceived,
    OfferUpdated,
    OfferRemoved,
    AppointmentRequested,
    AppointmentConfirmed,
    AppointmentDeclined,
    AppointmentRescheduled,
    AppointmentCancelled,
}

impl TimelineEntryType {
    /// Every entry type, in declaration order.
    pub const ALL: [Self; 20] = [
        Self::Created,
        Self::StageChange,
        Self::Note,
        Self::TransactionNote,
        Self::DocumentRequested,
        Self::DocumentSubmitted,
        Self::DocumentApproved,
        Self::DocumentNeedsRevision,
        Self::StatusChange,
        Self::PropertyAdded,
        Self::PropertyUpdated,
        Self::PropertyRemoved,
        Self::OfferReceived,
        Self::OfferUpdated,
        Self::OfferRemoved,
        Self::AppointmentRequested,
        Self::AppointmentConfirmed,
        Self::AppointmentDeclined,
        Self::AppointmentRescheduled,
        Self::AppointmentCancelled,
    ];

    /// Returns the canonical string label for this type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::StageChange => "STAGE_CHANGE",
            Self::Note => "NOTE",
            Self::TransactionNote => "TRANSACTION_NOTE",
            Self::DocumentRequested => "DOCUMENT_REQUESTED",
            Self::DocumentSubmitted => "DOCUMENT_SUBMITTED",
            Self::DocumentApproved => "DOCUMENT_APPROVED",
            Self::DocumentNeedsRevision => "DOCUMENT_NEEDS_REVISION",
            Self::StatusChange => "STATUS_CHANGE",
            Self::PropertyAdded => "PROPERTY_ADDED",
            Self::PropertyUpdated => "PROPERTY_UPDATED",
            Self::PropertyRemoved => "PROPERTY_REMOVED",
            Self::OfferReceived => "OFFER_RECEIVED",
            Self::OfferUpdated => "OFFER_UPDATED",
            Self::OfferRemoved => "OFFER_REMOVED",
            Self::AppointmentRequested => "APPOINTMENT_REQUESTED",
            Self::AppointmentConfirmed => "APPOINTMENT_CONFIRMED",
            Self::AppointmentDeclined => "APPOINTMENT_DECLINED",
            Self::AppointmentRescheduled => "APPOINTMENT_RESCHEDULED",
            Self::AppointmentCancelled => "APPOINTMENT_CANCELLED",
        }
    }
}

impl std::fmt::Display for TimelineEntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TimelineEntryType {
    type Err = ParseEntryTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseEntryTypeError(s.to_string()))
    }
}

/// Error returned when parsing an unknown entry type string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown timeline entry type: {0}")]
pub struct ParseEntryTypeError(pub String);

/// An offer on the transaction's property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferDetails {
    pub buyer_name: String,
    /// Offer amount in minor currency units.
    pub offer_amount_cents: Option<i64>,
    pub offer_status: String,
    pub previous_offer_status: Option<String>,
}

/// A status change on one of the transaction's conditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionChange {
    pub condition_type: String,
    pub custom_title: Option<String>,
    pub description: Option<String>,
    pub deadline: Option<NaiveDate>,
    pub previous_status: Option<String>,
    pub new_status: String,
}

/// The meeting slot an appointment entry refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentSlot {
    pub title: String,
    pub date_time: NaiveDateTime,
}

/// What happened, with exactly the fields relevant to that kind of fact.
///
/// Serialised to JSON in the `payload_json` column, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimelineEvent {
    /// The transaction was opened.
    Created {
        client_name: Option<String>,
        address: Option<String>,
    },
    /// The transaction moved to another stage of the pipeline.
    StageChange {
        previous_stage: Option<String>,
        new_stage: String,
        reason: Option<String>,
    },
    /// A free-text note; the text lives in the entry's `note`.
    Note,
    /// A note shared on the transaction itself.
    TransactionNote,
    DocumentRequested { doc_type: String },
    DocumentSubmitted { doc_type: String },
    DocumentApproved { doc_type: String },
    DocumentNeedsRevision { doc_type: String },
    StatusChange(ConditionChange),
    PropertyAdded { address: String },
    PropertyUpdated { address: String },
    PropertyRemoved { address: String },
    OfferReceived(OfferDetails),
    OfferUpdated(OfferDetails),
    OfferRemoved(OfferDetails),
    AppointmentRequested(AppointmentSlot),
    AppointmentConfirmed(AppointmentSlot),
    AppointmentDeclined(AppointmentSlot),
    AppointmentRescheduled(AppointmentSlot),
    AppointmentCancelled(AppointmentSlot),
}

impl TimelineEvent {
    /// Returns the entry type this payload belongs to.
    pub fn entry_type(&self) -> TimelineEntryType {
        match self {
            Self::Created { .. } => TimelineEntryType::Created,
            Self::StageChange { .. } => TimelineEntryType::StageChange,
            Self::Note => TimelineEntryType::Note,
            Self::TransactionNote => TimelineEntryType::TransactionNote,
            Self::DocumentRequested { .. } => TimelineEntryType::DocumentRequested,
            Self::DocumentSubmitted { .. } => TimelineEntryType::DocumentSubmitted,
            Self::DocumentApproved { .. } => TimelineEntryType::DocumentApproved,
            Self::DocumentNeedsRevision { .. } => TimelineEntryType::DocumentNeedsRevision,
            Self::StatusChange(_) => TimelineEntryType::StatusChange,
            Self::PropertyAdded { .. } => TimelineEntryType::PropertyAdded,
            Self::PropertyUpdated { .. } => TimelineEntryType::PropertyUpdated,
            Self::PropertyRemoved { .. } => TimelineEntryType::PropertyRemoved,
            Self::OfferReceived(_) => TimelineEntryType::OfferReceived,
            Self::OfferUpdated(_) => TimelineEntryType::OfferUpdated,
            Self::OfferRemoved(_) => TimelineEntryType::OfferRemoved,
            Self::AppointmentRequested(_) => TimelineEntryType::AppointmentRequested,
            Self::AppointmentConfirmed(_) => TimelineEntryType::AppointmentConfirmed,
            Self::AppointmentDeclined(_) => TimelineEntryType::AppointmentDeclined,
            Self::AppointmentRescheduled(_) => TimelineEntryType::AppointmentRescheduled,
            Self::AppointmentCancelled(_) => TimelineEntryType::AppointmentCancelled,
        }
    }

    /// Returns the document type for document-workflow entries.
    pub fn doc_type(&self) -> Option<&str> {
        match self {
            Self::DocumentRequested { doc_type }
            | Self::DocumentSubmitted { doc_type }
            | Self::DocumentApproved { doc_type }
            | Self::DocumentNeedsRevision { doc_type } => Some(doc_type),
            _ => None,
        }
    }
}

/// Who a timeline listing is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Audience {
    /// The broker sees every entry.
    Broker,
    /// The client sees only entries flagged `visible_to_client`.
    Client,
}

/// Listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortOrder {
    #[default]
    OldestFirst,
    NewestFirst,
}

/// A fact to append to a transaction's timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTimelineEntry {
    pub transaction_id: String,
    /// `None` for system-generated entries.
    pub actor_id: Option<String>,
    pub note: Option<String>,
    pub visible_to_client: bool,
    pub event: TimelineEvent,
}

impl NewTimelineEntry {
    /// Starts an entry for `transaction_id`, hidden from the client.
    pub fn new(transaction_id: impl Into<String>, event: TimelineEvent) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            actor_id: None,
            note: None,
            visible_to_client: false,
            event,
        }
    }

    pub fn by(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn visible_to_client(mut self, visible: bool) -> Self {
        self.visible_to_client = visible;
        self
    }
}

/// A single row from the `timeline_entries` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub id: String,
    pub transaction_id: String,
    /// Position within the transaction's timeline, starting at 1.
    pub seq: i64,
    pub actor_id: Option<String>,
    pub note: Option<String>,
    pub visible_to_client: bool,
    /// Never earlier than any previously appended entry of the same transaction.
    pub occurred_at: DateTime<Utc>,
    pub event: TimelineEvent,
}

impl TimelineEntry {
    pub fn entry_type(&self) -> TimelineEntryType {
        self.event.entry_type()
    }

    pub fn doc_type(&self) -> Option<&str> {
        self.event.doc_type()
    }
}
