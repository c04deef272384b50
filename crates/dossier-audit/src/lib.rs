//! Append-only audit trail.
//!
//! Every record is an immutable fact keyed by subject: appointment
//! transitions, logins and logouts, settings changes. The trail is never
//! updated or pruned; the schema rejects both.
//!
//! Two write paths share one table:
//!
//! - [`append_record`] is fallible and meant to run inside the caller's unit
//!   of work, so a fact and the change it describes commit together.
//! - [`AuditSink`] is fire-and-forget for side facts whose loss must never
//!   abort the primary operation.

mod error;
mod record;
mod sink;
mod store;

pub use error::AuditError;
pub use record::{AuditRecord, NewAuditRecord};
pub use sink::{AuditSink, PoolAuditSink};
pub use store::{append_record, query_audit, recent_audit, AuditFilter};

#[cfg(test)]
mod tests;
