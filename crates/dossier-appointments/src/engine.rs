//! The negotiation engine.
//!
//! Each operation is one unit of work: the row change, its audit record and
//! its timeline entry commit together or not at all. The notification is
//! dispatched only after the unit has committed.
//!
//! Checks run in a fixed order so the caller always gets the most specific
//! refusal: unknown appointment, then non-participant, then an illegal
//! state move, then a move the actor may not make, then bad fields.

use std::sync::Arc;

use dossier_audit::{append_record, NewAuditRecord};
use dossier_timeline::{
    append_entry, get_transaction, AppointmentSlot, NewTimelineEntry, TimelineError,
    TimelineEvent,
};
use dossier_types::{timestamp, Role};
use rusqlite::Connection;

use crate::error::AppointmentError;
use crate::machine::{next_status, AppointmentAction, AppointmentStatus, Transition};
use crate::model::{required_text, time_window, Appointment, AppointmentRequest, ReviewAction};
use crate::notify::{AppointmentNotification, NotificationDispatcher, NotificationKind};
use crate::store::{get_appointment, insert_appointment, update_appointment};

/// Drives appointments through their negotiation protocol.
#[derive(Clone)]
pub struct AppointmentEngine {
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl AppointmentEngine {
    pub fn new(dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Creates a PROPOSED appointment on behalf of one transaction party.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown transaction, `Validation` if the
    /// title is blank, the window is empty or the requester is not the
    /// party named by `requester_role`, `Internal` if the audit record or
    /// timeline entry cannot be written.
    pub fn request(
        &self,
        conn: &Connection,
        request: &AppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = dossier_db::atomically(conn, |conn| {
            let transaction =
                get_transaction(conn, &request.transaction_id).map_err(|e| match e {
                    TimelineError::TransactionNotFound(id) => AppointmentError::NotFound {
                        entity: "transaction",
                        id,
                    },
                    other => recording_failed(other),
                })?;

            let party = match request.requester_role {
                Role::Broker => &transaction.broker_id,
                Role::Client => &transaction.client_id,
            };
            if *party != request.requester_id {
                return Err(AppointmentError::Validation(format!(
                    "{} is not the {} of transaction {}",
                    request.requester_id, request.requester_role, transaction.transaction_id
                )));
            }

            let title = required_text("title", &request.title)?;
            let (from_date_time, to_date_time) =
                time_window(request.date, request.start_time, request.end_time)?;

            let now = timestamp::stored_now();
            let appointment = Appointment {
                id: uuid::Uuid::new_v4().to_string(),
                transaction_id: transaction.transaction_id,
                broker_id: transaction.broker_id,
                client_id: transaction.client_id,
                title: title.to_string(),
                from_date_time,
                to_date_time,
                status: AppointmentStatus::Proposed,
                initiated_by: request.requester_role,
                location: request.location.clone(),
                coordinates: request.coordinates,
                notes: request.message.clone(),
                property_id: request.property_id.clone(),
                visitor_id: request.visitor_id.clone(),
                refusal_reason: None,
                cancellation_reason: None,
                cancelled_by: None,
                version: 1,
                created_at: now,
                updated_at: now,
            };
            insert_appointment(conn, &appointment)?;
            record(
                conn,
                &appointment,
                AppointmentAction::Created,
                &request.requester_id,
                request.message.as_deref(),
            )?;
            Ok(appointment)
        })?;

        tracing::info!(
            appointment_id = %appointment.id,
            transaction_id = %appointment.transaction_id,
            initiated_by = %appointment.initiated_by,
            "appointment requested"
        );
        self.notify(
            &appointment,
            NotificationKind::Requested,
            &request.requester_id,
        );
        Ok(appointment)
    }

    /// Applies the counterparty's answer to the proposal on the table.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown appointment, `Validation` if the
    /// reviewer is not a participant or the action's fields are invalid,
    /// `InvalidTransition` if the appointment is not awaiting review or the
    /// reviewer made the proposal, `Conflict` if the row changed under us,
    /// `Internal` if the change cannot be recorded.
    pub fn review(
        &self,
        conn: &Connection,
        appointment_id: &str,
        reviewer_id: &str,
        action: &ReviewAction,
    ) -> Result<Appointment, AppointmentError> {
        let transition = action.transition();

        let appointment = dossier_db::atomically(conn, |conn| {
            let current = get_appointment(conn, appointment_id)?;
            let role = participant_role(&current, reviewer_id)?;
            let status = allowed(&current, transition)?;

            if role == current.initiated_by {
                return Err(AppointmentError::InvalidTransition {
                    from: current.status,
                    action: transition,
                    reason: "only the counterparty may review a proposal",
                });
            }

            let mut next = current.clone();
            next.status = status;
            let details = match action {
                ReviewAction::Confirm => None,
                ReviewAction::Decline { refusal_reason } => {
                    let reason = required_text("refusal_reason", refusal_reason)?;
                    next.refusal_reason = Some(reason.to_string());
                    Some(reason.to_string())
                }
                ReviewAction::Reschedule {
                    new_date,
                    new_start_time,
                    new_end_time,
                } => {
                    let (from, to) = time_window(*new_date, *new_start_time, *new_end_time)?;
                    next.from_date_time = from;
                    next.to_date_time = to;
                    next.initiated_by = role;
                    Some(format!("{} -> {from} - {to}", current.from_date_time))
                }
            };

            commit_change(conn, &current, next, transition, reviewer_id, details.as_deref())
        })?;

        tracing::info!(
            appointment_id,
            reviewer_id,
            action = %transition,
            status = %appointment.status,
            "appointment reviewed"
        );
        self.notify(&appointment, transition.notification_kind(), reviewer_id);
        Ok(appointment)
    }

    /// Cancels a PROPOSED or CONFIRMED appointment. Either participant may.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown appointment, `Validation` if the
    /// canceller is not a participant or the reason is blank,
    /// `InvalidTransition` if the appointment is already terminal,
    /// `Conflict` if the row changed under us, `Internal` if the change
    /// cannot be recorded.
    pub fn cancel(
        &self,
        conn: &Connection,
        appointment_id: &str,
        canceller_id: &str,
        reason: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = dossier_db::atomically(conn, |conn| {
            let current = get_appointment(conn, appointment_id)?;
            participant_role(&current, canceller_id)?;
            let status = allowed(&current, Transition::Cancel)?;
            let reason = required_text("cancellation_reason", reason)?;

            let mut next = current.clone();
            next.status = status;
            next.cancellation_reason = Some(reason.to_string());
            next.cancelled_by = Some(canceller_id.to_string());

            commit_change(
                conn,
                &current,
                next,
                Transition::Cancel,
                canceller_id,
                Some(reason),
            )
        })?;

        tracing::info!(appointment_id, canceller_id, "appointment cancelled");
        self.notify(
            &appointment,
            Transition::Cancel.notification_kind(),
            canceller_id,
        );
        Ok(appointment)
    }

    fn notify(&self, appointment: &Appointment, kind: NotificationKind, actor_id: &str) {
        let recipient = match appointment.role_of(actor_id) {
            Some(role) => appointment.participant(role.counterparty()),
            None => return,
        };
        self.dispatcher.dispatch(AppointmentNotification {
            kind,
            appointment_id: appointment.id.clone(),
            transaction_id: appointment.transaction_id.clone(),
            actor_id: actor_id.to_string(),
            recipient_id: recipient.to_string(),
            title: appointment.title.clone(),
            from_date_time: appointment.from_date_time,
        });
    }
}

fn participant_role(appointment: &Appointment, actor_id: &str) -> Result<Role, AppointmentError> {
    appointment.role_of(actor_id).ok_or_else(|| {
        AppointmentError::Validation(format!(
            "{actor_id} is not a participant of appointment {}",
            appointment.id
        ))
    })
}

fn allowed(
    appointment: &Appointment,
    transition: Transition,
) -> Result<AppointmentStatus, AppointmentError> {
    next_status(appointment.status, transition).ok_or(AppointmentError::InvalidTransition {
        from: appointment.status,
        action: transition,
        reason: if appointment.status.is_terminal() {
            "appointment is already closed"
        } else {
            "appointment is not awaiting review"
        },
    })
}

/// Writes `next` over `current` and records the transition.
fn commit_change(
    conn: &Connection,
    current: &Appointment,
    mut next: Appointment,
    transition: Transition,
    actor_id: &str,
    details: Option<&str>,
) -> Result<Appointment, AppointmentError> {
    next.version = current.version + 1;
    next.updated_at = timestamp::stored_now();

    if !update_appointment(conn, &next, current.version)? {
        return Err(AppointmentError::Conflict(current.id.clone()));
    }
    record(conn, &next, transition.audit_action(), actor_id, details)?;
    Ok(next)
}

/// Appends the audit record and timeline entry for `action`.
fn record(
    conn: &Connection,
    appointment: &Appointment,
    action: AppointmentAction,
    actor_id: &str,
    details: Option<&str>,
) -> Result<(), AppointmentError> {
    let mut audit = NewAuditRecord::now(&appointment.id, action.as_str())
        .by(actor_id)
        .at(appointment.updated_at);
    if let Some(details) = details {
        audit = audit.with_details(details);
    }
    append_record(conn, &audit).map_err(recording_failed)?;

    let slot = AppointmentSlot {
        title: appointment.title.clone(),
        date_time: appointment.from_date_time,
    };
    let event = match action {
        AppointmentAction::Created => TimelineEvent::AppointmentRequested(slot),
        AppointmentAction::Confirmed => TimelineEvent::AppointmentConfirmed(slot),
        AppointmentAction::Declined => TimelineEvent::AppointmentDeclined(slot),
        AppointmentAction::Rescheduled => TimelineEvent::AppointmentRescheduled(slot),
        AppointmentAction::Cancelled => TimelineEvent::AppointmentCancelled(slot),
    };
    let mut entry = NewTimelineEntry::new(&appointment.transaction_id, event)
        .by(actor_id)
        .visible_to_client(true);
    if let Some(details) = details {
        entry = entry.with_note(details);
    }
    append_entry(conn, &entry).map_err(recording_failed)?;
    Ok(())
}

fn recording_failed(e: impl std::fmt::Display) -> AppointmentError {
    AppointmentError::Internal(e.to_string())
}
