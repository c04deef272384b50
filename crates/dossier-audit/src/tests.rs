//! Unit tests for the audit trail.

use chrono::{Duration, TimeZone, Utc};
use dossier_db::{create_pool, DbRuntimeSettings};
use rusqlite::Connection;

use crate::record::NewAuditRecord;
use crate::sink::{AuditSink, PoolAuditSink};
use crate::store::{append_record, query_audit, recent_audit, AuditFilter};

fn test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("should open in-memory db");
    dossier_db::run_migrations(&conn).expect("migrations should succeed");
    conn
}

fn single_connection_pool() -> dossier_db::DbPool {
    create_pool(
        ":memory:",
        DbRuntimeSettings {
            busy_timeout_ms: 1_000,
            pool_max_size: 1,
        },
    )
    .expect("pool creation should succeed")
}

fn seed(conn: &Connection) {
    let base = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
    let facts = [
        ("appt-1", "CREATED", 0),
        ("user-7", "LOGIN", 1),
        ("appt-1", "CONFIRMED", 2),
        ("user-7", "LOGOUT", 3),
        ("appt-1", "CANCELLED", 4),
    ];
    for (subject, action, minutes) in facts {
        append_record(
            conn,
            &NewAuditRecord::now(subject, action)
                .by("someone")
                .at(base + Duration::minutes(minutes)),
        )
        .expect("append should succeed");
    }
}

#[test]
fn append_record_returns_stored_fact() {
    let conn = test_db();
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();

    let record = append_record(
        &conn,
        &NewAuditRecord::now("appt-1", "CREATED")
            .by("client-1")
            .at(at)
            .with_details("Viewing requested"),
    )
    .expect("append should succeed");

    assert!(record.id > 0);
    let stored = query_audit(&conn, &AuditFilter::default()).expect("query");
    assert_eq!(stored, vec![record]);
    assert_eq!(stored[0].performed_at, at);
}

#[test]
fn returned_record_matches_what_is_read_back() {
    let conn = test_db();

    let now = append_record(&conn, &NewAuditRecord::now("user-7", "LOGIN")).expect("append");
    let precise = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
        + Duration::nanoseconds(123_456_789);
    let explicit = append_record(
        &conn,
        &NewAuditRecord::now("user-7", "LOGOUT").at(precise),
    )
    .expect("append");
    assert_eq!(explicit.performed_at.timestamp_subsec_nanos(), 123_456_000);

    let stored = query_audit(
        &conn,
        &AuditFilter {
            subject_id: Some("user-7".to_string()),
            ..Default::default()
        },
    )
    .expect("query");
    assert_eq!(stored.len(), 2);
    assert!(stored.contains(&now));
    assert!(stored.contains(&explicit));
}

#[test]
fn records_cannot_be_rewritten() {
    let conn = test_db();
    seed(&conn);

    assert!(conn
        .execute("UPDATE audit_log SET action = 'FORGED'", [])
        .is_err());
    assert!(conn.execute("DELETE FROM audit_log", []).is_err());
    assert_eq!(recent_audit(&conn, 10).expect("recent").len(), 5);
}

#[test]
fn query_by_subject_is_ordered_oldest_first() {
    let conn = test_db();
    seed(&conn);

    let actions: Vec<String> = query_audit(
        &conn,
        &AuditFilter {
            subject_id: Some("appt-1".to_string()),
            ..Default::default()
        },
    )
    .expect("query")
    .into_iter()
    .map(|r| r.action)
    .collect();

    assert_eq!(actions, vec!["CREATED", "CONFIRMED", "CANCELLED"]);
}

#[test]
fn query_by_time_range_is_half_open() {
    let conn = test_db();
    seed(&conn);
    let base = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();

    let actions: Vec<String> = query_audit(
        &conn,
        &AuditFilter {
            since: Some(base + Duration::minutes(1)),
            until: Some(base + Duration::minutes(3)),
            ..Default::default()
        },
    )
    .expect("query")
    .into_iter()
    .map(|r| r.action)
    .collect();

    assert_eq!(actions, vec!["LOGIN", "CONFIRMED"]);
}

#[test]
fn query_respects_limit() {
    let conn = test_db();
    seed(&conn);

    let records = query_audit(
        &conn,
        &AuditFilter {
            limit: Some(2),
            ..Default::default()
        },
    )
    .expect("query");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].action, "CREATED");
}

#[test]
fn recent_returns_newest_first() {
    let conn = test_db();
    seed(&conn);

    let actions: Vec<String> = recent_audit(&conn, 2)
        .expect("recent")
        .into_iter()
        .map(|r| r.action)
        .collect();
    assert_eq!(actions, vec!["CANCELLED", "LOGOUT"]);
}

#[test]
fn pool_sink_writes_records() {
    let pool = single_connection_pool();
    {
        let conn = pool.get().expect("connection");
        dossier_db::run_migrations(&conn).expect("migrations");
    }

    let sink = PoolAuditSink::new(pool.clone());
    sink.record(NewAuditRecord::now("user-7", "LOGOUT").by("user-7"));

    let conn = pool.get().expect("connection");
    let records = recent_audit(&conn, 10).expect("recent");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action, "LOGOUT");
}

#[test]
fn pool_sink_swallows_write_failures() {
    // No migrations: the audit_log table does not exist.
    let sink = PoolAuditSink::new(single_connection_pool());
    sink.record(NewAuditRecord::now("user-7", "LOGOUT"));
}
