//! The transaction timeline and its per-broker seen-state.
//!
//! Every fact about a transaction (stage changes, document exchanges,
//! offers, property edits, appointment negotiation) is recorded as an
//! immutable, ordered [`TimelineEntry`]. Entries are never edited or
//! removed; a correction is a new entry. Brokers acknowledge entries with
//! seen markers, which back unread badges and counts.
//!
//! # Entry categories
//!
//! | Category | Entry types |
//! |----------|-------------|
//! | Lifecycle | `CREATED`, `STAGE_CHANGE` |
//! | Notes | `NOTE`, `TRANSACTION_NOTE` |
//! | Documents | `DOCUMENT_REQUESTED`, `DOCUMENT_SUBMITTED`, `DOCUMENT_APPROVED`, `DOCUMENT_NEEDS_REVISION` |
//! | Conditions | `STATUS_CHANGE` |
//! | Property | `PROPERTY_ADDED`, `PROPERTY_UPDATED`, `PROPERTY_REMOVED` |
//! | Offers | `OFFER_RECEIVED`, `OFFER_UPDATED`, `OFFER_REMOVED` |
//! | Appointments | `APPOINTMENT_REQUESTED`, `APPOINTMENT_CONFIRMED`, `APPOINTMENT_DECLINED`, `APPOINTMENT_RESCHEDULED`, `APPOINTMENT_CANCELLED` |
//!
//! # Usage
//!
//! ```rust,ignore
//! use dossier_timeline::{append_entry, NewTimelineEntry, TimelineEvent};
//!
//! append_entry(
//!     &conn,
//!     &NewTimelineEntry::new("tx-42", TimelineEvent::DocumentRequested {
//!         doc_type: "PRE_APPROVAL".to_string(),
//!     })
//!     .by("broker-7")
//!     .visible_to_client(true),
//! )?;
//! ```

mod error;
mod event;
mod render;
mod seen;
mod store;
mod transaction;

pub use error::TimelineError;
pub use event::{
    AppointmentSlot, Audience, ConditionChange, NewTimelineEntry, OfferDetails,
    ParseEntryTypeError, SortOrder, TimelineEntry, TimelineEntryType, TimelineEvent,
};
pub use render::{render_timeline, TimelineItem};
pub use seen::{
    clear_seen, is_seen, mark_all_seen, mark_seen, seen_status, unseen_count, unseen_counts,
};
pub use store::{append_entry, append_entry_at, get_entry, list_client_feed, list_for_transaction};
pub use transaction::{change_stage, get_transaction, open_transaction, NewTransaction, Transaction};

#[cfg(test)]
mod tests;
