//! Error types for appointment negotiation.

use crate::machine::{AppointmentStatus, Transition};

/// Errors returned by the negotiation engine.
///
/// `NotFound`, `InvalidTransition` and `Validation` are final: retrying the
/// same call gives the same answer. `Conflict` means nothing was committed
/// and the caller may re-read and try again. `Internal` means the change
/// and its record could not be written together, so neither was kept.
#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("cannot {action} a {from} appointment: {reason}")]
    InvalidTransition {
        from: AppointmentStatus,
        action: Transition,
        reason: &'static str,
    },

    #[error("invalid appointment input: {0}")]
    Validation(String),

    #[error("appointment {0} was modified concurrently")]
    Conflict(String),

    #[error("appointment change could not be recorded: {0}")]
    Internal(String),

    #[error("appointment database error: {0}")]
    Database(#[from] rusqlite::Error),
}
