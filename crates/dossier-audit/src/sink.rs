//! Fire-and-forget audit writers.
//!
//! Login, logout, settings and password-reset facts are recorded on the
//! side of the operation that caused them. An [`AuditSink`] never reports
//! failure to its caller; a record that cannot be written is reported on
//! the operational log instead.

use std::sync::Arc;

use dossier_db::DbPool;

use crate::record::NewAuditRecord;
use crate::store::append_record;

/// A narrow append-only log for side facts.
pub trait AuditSink: Send + Sync {
    /// Records `record`. Never fails from the caller's point of view.
    fn record(&self, record: NewAuditRecord);
}

impl<S: AuditSink + ?Sized> AuditSink for Arc<S> {
    fn record(&self, record: NewAuditRecord) {
        (**self).record(record)
    }
}

/// Writes records synchronously through a connection pool.
#[derive(Clone)]
pub struct PoolAuditSink {
    pool: DbPool,
}

impl PoolAuditSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl AuditSink for PoolAuditSink {
    fn record(&self, record: NewAuditRecord) {
        let result = self
            .pool
            .get()
            .map_err(crate::AuditError::from)
            .and_then(|conn| append_record(&conn, &record));

        if let Err(e) = result {
            tracing::error!(
                subject_id = %record.subject_id,
                action = %record.action,
                error = %e,
                "failed to write audit record"
            );
        }
    }
}
