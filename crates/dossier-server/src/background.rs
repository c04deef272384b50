//! Background tasks for the dossier server.
//!
//! Includes:
//! - The notification worker fed by [`ChannelDispatcher`].
//! - The audit writer fed by [`ChannelAuditSink`].
//!
//! Both queues are bounded. Producers never wait: when a queue is full or
//! its worker has stopped, the item is dropped and a warning is logged.

use dossier_appointments::{AppointmentNotification, NotificationDispatcher};
use dossier_audit::{append_record, AuditSink, NewAuditRecord};
use dossier_db::DbPool;
use tokio::sync::mpsc;

/// Queues notifications for the notification worker.
#[derive(Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::Sender<AppointmentNotification>,
}

impl ChannelDispatcher {
    /// Creates the dispatcher and the receiving end for
    /// [`run_notification_worker`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AppointmentNotification>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl NotificationDispatcher for ChannelDispatcher {
    fn dispatch(&self, notification: AppointmentNotification) {
        if let Err(e) = self.tx.try_send(notification) {
            tracing::warn!("dropping appointment notification: {}", e);
        }
    }
}

/// Delivers queued notifications until every sender is gone.
///
/// Delivery is a structured log line; a mail or push integration would
/// hook in here.
pub async fn run_notification_worker(mut rx: mpsc::Receiver<AppointmentNotification>) {
    tracing::info!("starting notification worker");

    while let Some(notification) = rx.recv().await {
        tracing::info!(
            kind = notification.kind.as_str(),
            appointment_id = %notification.appointment_id,
            transaction_id = %notification.transaction_id,
            actor_id = %notification.actor_id,
            recipient_id = %notification.recipient_id,
            title = %notification.title,
            "appointment notification"
        );
    }

    tracing::info!("notification worker stopped");
}

/// Queues side-fact audit records for the audit writer.
#[derive(Clone)]
pub struct ChannelAuditSink {
    tx: mpsc::Sender<NewAuditRecord>,
}

impl ChannelAuditSink {
    /// Creates the sink and the receiving end for [`run_audit_writer`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<NewAuditRecord>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl AuditSink for ChannelAuditSink {
    fn record(&self, record: NewAuditRecord) {
        if let Err(e) = self.tx.try_send(record) {
            tracing::warn!("dropping audit record: {}", e);
        }
    }
}

/// Writes queued audit records until every sender is gone.
///
/// A record that cannot be written is logged and skipped.
pub async fn run_audit_writer(pool: DbPool, mut rx: mpsc::Receiver<NewAuditRecord>) {
    tracing::info!("starting audit writer");

    while let Some(record) = rx.recv().await {
        let pool = pool.clone();
        let subject_id = record.subject_id.clone();
        let action = record.action.clone();

        let res = tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(|e| e.to_string())?;
            append_record(&conn, &record).map_err(|e| e.to_string())
        })
        .await;

        match res {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                tracing::error!(%subject_id, %action, "failed to write audit record: {}", e);
            }
            Err(e) => {
                tracing::error!("audit writer join error: {}", e);
            }
        }
    }

    tracing::info!("audit writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use dossier_appointments::NotificationKind;
    use dossier_db::{create_pool, run_migrations, DbRuntimeSettings};

    fn notification() -> AppointmentNotification {
        AppointmentNotification {
            kind: NotificationKind::Confirmed,
            appointment_id: "appt-1".to_string(),
            transaction_id: "tx-1".to_string(),
            actor_id: "broker-1".to_string(),
            recipient_id: "client-1".to_string(),
            title: "Viewing".to_string(),
            from_date_time: NaiveDate::from_ymd_opt(2030, 6, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        }
    }

    #[tokio::test]
    async fn full_notification_queue_drops_instead_of_blocking() {
        let (dispatcher, mut rx) = ChannelDispatcher::channel(1);

        dispatcher.dispatch(notification());
        dispatcher.dispatch(notification());

        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dispatch_after_worker_stops_is_silent() {
        let (dispatcher, rx) = ChannelDispatcher::channel(4);
        drop(rx);
        dispatcher.dispatch(notification());
    }

    #[tokio::test]
    async fn audit_writer_persists_queued_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.db");
        let pool = create_pool(path.to_str().unwrap(), DbRuntimeSettings::default()).unwrap();
        run_migrations(&pool.get().unwrap()).unwrap();

        let (sink, rx) = ChannelAuditSink::channel(8);
        sink.record(NewAuditRecord::now("user-7", "LOGIN").by("user-7"));
        sink.record(NewAuditRecord::now("user-7", "LOGOUT").by("user-7"));
        drop(sink);

        run_audit_writer(pool.clone(), rx).await;

        let conn = pool.get().unwrap();
        let actions: Vec<String> = dossier_audit::recent_audit(&conn, 10)
            .unwrap()
            .into_iter()
            .map(|r| r.action)
            .collect();
        assert_eq!(actions.len(), 2);
        assert!(actions.contains(&"LOGIN".to_string()));
        assert!(actions.contains(&"LOGOUT".to_string()));
    }
}
