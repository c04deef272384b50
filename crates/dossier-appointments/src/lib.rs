//! Appointment negotiation between a broker and a client.
//!
//! An appointment is proposed by one side and answered by the other. The
//! counterparty may confirm it, decline it with a reason, or reschedule it,
//! which puts a new proposal on the table for the original requester to
//! answer. Either side may cancel while it is still open.
//!
//! Every committed change bumps the row's `version`, appends an audit record
//! (subject = appointment id) and a client-visible timeline entry in the same
//! unit of work, then dispatches one notification to the other participant.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dossier_appointments::{AppointmentEngine, LogOnlyDispatcher, ReviewAction};
//!
//! let engine = AppointmentEngine::new(Arc::new(LogOnlyDispatcher));
//! let appointment = engine.request(&conn, &request)?;
//! engine.review(&conn, &appointment.id, "broker-7", &ReviewAction::Confirm)?;
//! ```

mod engine;
mod error;
mod machine;
mod model;
mod notify;
mod store;

pub use engine::AppointmentEngine;
pub use error::AppointmentError;
pub use machine::{next_status, AppointmentAction, AppointmentStatus, ParseLabelError, Transition};
pub use model::{
    Appointment, AppointmentAuditRecord, AppointmentRequest, Coordinates, ReviewAction,
};
pub use notify::{
    AppointmentNotification, LogOnlyDispatcher, NotificationDispatcher, NotificationKind,
};
pub use store::{appointment_history, get_appointment, list_appointments};
