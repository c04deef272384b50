//! Unit tests for the timeline store and seen-state tracker.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use dossier_types::NoDirectory;
use rusqlite::Connection;

use crate::error::TimelineError;
use crate::event::*;
use crate::render::render_timeline;
use crate::seen::*;
use crate::store::*;
use crate::transaction::*;

fn test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("should open in-memory db");
    dossier_db::run_migrations(&conn).expect("migrations should succeed");
    conn
}

fn seed_transaction(conn: &Connection, transaction_id: &str) -> TimelineEntry {
    let (_, created) = open_transaction(
        conn,
        &NewTransaction {
            transaction_id: transaction_id.to_string(),
            broker_id: "broker-1".to_string(),
            client_id: "client-1".to_string(),
            address: Some("12 Harbour St".to_string()),
            stage: "BUYER_PREQUALIFY".to_string(),
            client_name: Some("Sam Client".to_string()),
        },
    )
    .expect("should open transaction");
    created
}

fn note(conn: &Connection, transaction_id: &str, text: &str, visible: bool) -> TimelineEntry {
    append_entry(
        conn,
        &NewTimelineEntry::new(transaction_id, TimelineEvent::Note)
            .by("broker-1")
            .with_note(text)
            .visible_to_client(visible),
    )
    .expect("append should succeed")
}

// ── append ───────────────────────────────────────────────────────────

#[test]
fn open_transaction_records_created_entry() {
    let conn = test_db();
    let created = seed_transaction(&conn, "tx-1");

    assert_eq!(created.seq, 1);
    assert_eq!(created.entry_type(), TimelineEntryType::Created);
    assert!(created.visible_to_client);
    assert_eq!(created.actor_id.as_deref(), Some("broker-1"));
    assert_eq!(
        created.event,
        TimelineEvent::Created {
            client_name: Some("Sam Client".to_string()),
            address: Some("12 Harbour St".to_string()),
        }
    );
}

#[test]
fn open_transaction_rejects_duplicate_id() {
    let conn = test_db();
    seed_transaction(&conn, "tx-1");

    let err = open_transaction(
        &conn,
        &NewTransaction {
            transaction_id: "tx-1".to_string(),
            broker_id: "broker-2".to_string(),
            client_id: "client-2".to_string(),
            address: None,
            stage: "OPEN".to_string(),
            client_name: None,
        },
    )
    .expect_err("duplicate id should fail");
    assert!(matches!(err, TimelineError::TransactionExists(id) if id == "tx-1"));

    let entries = list_for_transaction(&conn, "tx-1", Audience::Broker, SortOrder::OldestFirst)
        .expect("list should succeed");
    assert_eq!(entries.len(), 1, "failed open must not append an entry");
}

#[test]
fn append_to_unknown_transaction_is_not_found() {
    let conn = test_db();

    let err = append_entry(&conn, &NewTimelineEntry::new("missing", TimelineEvent::Note))
        .expect_err("unknown transaction should fail");
    assert!(matches!(err, TimelineError::TransactionNotFound(id) if id == "missing"));
}

#[test]
fn sequence_numbers_are_transaction_scoped() {
    let conn = test_db();
    seed_transaction(&conn, "tx-1");
    seed_transaction(&conn, "tx-2");

    let a = note(&conn, "tx-1", "first", false);
    let b = note(&conn, "tx-1", "second", false);
    let c = note(&conn, "tx-2", "other", false);

    assert_eq!((a.seq, b.seq, c.seq), (2, 3, 2));
    assert_ne!(a.id, b.id);
}

#[test]
fn occurred_at_never_decreases_when_the_clock_goes_backwards() {
    let conn = test_db();
    seed_transaction(&conn, "tx-1");

    let t0 = Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap();
    let first = append_entry_at(
        &conn,
        &NewTimelineEntry::new("tx-1", TimelineEvent::Note),
        t0,
    )
    .expect("first append");
    let second = append_entry_at(
        &conn,
        &NewTimelineEntry::new("tx-1", TimelineEvent::Note),
        t0 - Duration::minutes(5),
    )
    .expect("second append");
    let third = append_entry_at(
        &conn,
        &NewTimelineEntry::new("tx-1", TimelineEvent::Note),
        t0 + Duration::seconds(1),
    )
    .expect("third append");

    assert_eq!(first.occurred_at, t0);
    assert_eq!(second.occurred_at, t0, "clamped to the latest existing entry");
    assert_eq!(third.occurred_at, t0 + Duration::seconds(1));
}

#[test]
fn payload_round_trips_through_storage() {
    let conn = test_db();
    seed_transaction(&conn, "tx-1");

    let events = vec![
        TimelineEvent::OfferReceived(OfferDetails {
            buyer_name: "Alex Buyer".to_string(),
            offer_amount_cents: Some(45_000_000),
            offer_status: "PENDING".to_string(),
            previous_offer_status: None,
        }),
        TimelineEvent::StatusChange(ConditionChange {
            condition_type: "FINANCING".to_string(),
            custom_title: None,
            description: Some("Mortgage approval".to_string()),
            deadline: NaiveDate::from_ymd_opt(2030, 2, 1),
            previous_status: Some("PENDING".to_string()),
            new_status: "SATISFIED".to_string(),
        }),
        TimelineEvent::DocumentNeedsRevision {
            doc_type: "PURCHASE_AGREEMENT".to_string(),
        },
        TimelineEvent::PropertyRemoved {
            address: "9 Elm Rd".to_string(),
        },
    ];

    for event in &events {
        append_entry(&conn, &NewTimelineEntry::new("tx-1", event.clone()))
            .expect("append should succeed");
    }

    let stored: Vec<TimelineEvent> =
        list_for_transaction(&conn, "tx-1", Audience::Broker, SortOrder::OldestFirst)
            .expect("list should succeed")
            .into_iter()
            .skip(1)
            .map(|entry| entry.event)
            .collect();
    assert_eq!(stored, events);
}

#[test]
fn entry_type_and_doc_type_columns_follow_payload() {
    let conn = test_db();
    seed_transaction(&conn, "tx-1");

    let entry = append_entry(
        &conn,
        &NewTimelineEntry::new(
            "tx-1",
            TimelineEvent::DocumentSubmitted {
                doc_type: "ID".to_string(),
            },
        ),
    )
    .expect("append should succeed");
    assert_eq!(entry.doc_type(), Some("ID"));

    let (entry_type, doc_type): (String, Option<String>) = conn
        .query_row(
            "SELECT entry_type, doc_type FROM timeline_entries WHERE id = ?1",
            [&entry.id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("should query row");
    assert_eq!(entry_type, "DOCUMENT_SUBMITTED");
    assert_eq!(doc_type.as_deref(), Some("ID"));
}

#[test]
fn entry_type_labels_parse_back() {
    for entry_type in TimelineEntryType::ALL {
        assert_eq!(entry_type.as_str().parse::<TimelineEntryType>(), Ok(entry_type));
    }
    assert!("APPOINTMENT".parse::<TimelineEntryType>().is_err());
}

// ── list ─────────────────────────────────────────────────────────────

#[test]
fn client_view_only_contains_visible_entries() {
    let conn = test_db();
    seed_transaction(&conn, "tx-1");
    note(&conn, "tx-1", "internal", false);
    let shared = note(&conn, "tx-1", "shared", true);

    let broker = list_for_transaction(&conn, "tx-1", Audience::Broker, SortOrder::OldestFirst)
        .expect("broker view");
    let client = list_for_transaction(&conn, "tx-1", Audience::Client, SortOrder::OldestFirst)
        .expect("client view");

    assert_eq!(broker.len(), 3);
    assert_eq!(client.len(), 2);
    assert!(client.iter().all(|e| e.visible_to_client));
    assert_eq!(client.last().map(|e| e.id.as_str()), Some(shared.id.as_str()));
}

#[test]
fn newest_first_reverses_order() {
    let conn = test_db();
    seed_transaction(&conn, "tx-1");
    note(&conn, "tx-1", "a", false);
    note(&conn, "tx-1", "b", false);

    let seqs: Vec<i64> = list_for_transaction(&conn, "tx-1", Audience::Broker, SortOrder::NewestFirst)
        .expect("list")
        .iter()
        .map(|e| e.seq)
        .collect();
    assert_eq!(seqs, vec![3, 2, 1]);
}

#[test]
fn listing_unknown_transaction_is_not_found() {
    let conn = test_db();
    let err = list_for_transaction(&conn, "nope", Audience::Client, SortOrder::OldestFirst)
        .expect_err("unknown transaction");
    assert!(matches!(err, TimelineError::TransactionNotFound(_)));
}

#[test]
fn earlier_listings_stay_a_prefix_of_later_ones() {
    let conn = test_db();
    seed_transaction(&conn, "tx-1");
    note(&conn, "tx-1", "one", true);

    let before = list_for_transaction(&conn, "tx-1", Audience::Broker, SortOrder::OldestFirst)
        .expect("first listing");

    note(&conn, "tx-1", "two", false);
    change_stage(&conn, "tx-1", "broker-1", "BUYER_OFFER", None, true).expect("stage change");

    let after = list_for_transaction(&conn, "tx-1", Audience::Broker, SortOrder::OldestFirst)
        .expect("second listing");

    assert_eq!(after.len(), before.len() + 2);
    assert_eq!(&after[..before.len()], before.as_slice());
}

#[test]
fn change_stage_updates_row_and_records_previous_stage() {
    let conn = test_db();
    seed_transaction(&conn, "tx-1");

    let entry = change_stage(
        &conn,
        "tx-1",
        "broker-1",
        "BUYER_OFFER",
        Some("pre-approval received"),
        true,
    )
    .expect("stage change");

    assert_eq!(
        entry.event,
        TimelineEvent::StageChange {
            previous_stage: Some("BUYER_PREQUALIFY".to_string()),
            new_stage: "BUYER_OFFER".to_string(),
            reason: Some("pre-approval received".to_string()),
        }
    );
    assert_eq!(
        get_transaction(&conn, "tx-1").expect("transaction").stage,
        "BUYER_OFFER"
    );
}

#[test]
fn client_feed_spans_transactions_newest_first() {
    let conn = test_db();
    seed_transaction(&conn, "tx-1");
    seed_transaction(&conn, "tx-2");
    note(&conn, "tx-1", "hidden", false);
    let latest = note(&conn, "tx-2", "shared", true);

    let feed = list_client_feed(&conn, "client-1", 10).expect("feed");
    assert_eq!(feed.len(), 3, "two CREATED entries and one shared note");
    assert_eq!(feed[0].id, latest.id);
    assert!(list_client_feed(&conn, "someone-else", 10)
        .expect("feed")
        .is_empty());
}

// ── seen-state ───────────────────────────────────────────────────────

#[test]
fn mark_seen_is_idempotent() {
    let conn = test_db();
    let entry = seed_transaction(&conn, "tx-1");

    mark_seen(&conn, "broker-x", &entry.id).expect("first mark");
    assert!(is_seen(&conn, "broker-x", &entry.id).expect("is_seen"));
    mark_seen(&conn, "broker-x", &entry.id).expect("second mark");
    assert!(is_seen(&conn, "broker-x", &entry.id).expect("is_seen"));

    let markers: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM seen_markers WHERE broker_id = 'broker-x'",
            [],
            |row| row.get(0),
        )
        .expect("count markers");
    assert_eq!(markers, 1);
}

#[test]
fn seen_state_is_per_broker() {
    let conn = test_db();
    let entry = seed_transaction(&conn, "tx-1");

    mark_seen(&conn, "broker-x", &entry.id).expect("mark");
    assert!(!is_seen(&conn, "broker-y", &entry.id).expect("is_seen"));
}

#[test]
fn unknown_entries_are_never_seen() {
    let conn = test_db();
    seed_transaction(&conn, "tx-1");

    mark_seen(&conn, "broker-x", "no-such-entry").expect("marking unknown is tolerated");
    assert!(!is_seen(&conn, "broker-x", "no-such-entry").expect("is_seen"));

    let status = seen_status(&conn, "broker-x", &["no-such-entry"]).expect("status");
    assert_eq!(status.get("no-such-entry"), Some(&false));
}

#[test]
fn seen_status_resolves_many_ids_at_once() {
    let conn = test_db();
    seed_transaction(&conn, "tx-1");
    let e1 = note(&conn, "tx-1", "1", false);
    let e2 = note(&conn, "tx-1", "2", false);
    let e3 = note(&conn, "tx-1", "3", false);

    mark_seen(&conn, "broker-x", &e1.id).expect("mark 1");
    mark_seen(&conn, "broker-x", &e3.id).expect("mark 3");

    let status = seen_status(&conn, "broker-x", &[&e1.id, &e2.id, &e3.id]).expect("status");

    let expected: HashMap<String, bool> = [
        (e1.id.clone(), true),
        (e2.id.clone(), false),
        (e3.id.clone(), true),
    ]
    .into_iter()
    .collect();
    assert_eq!(status, expected);
}

#[test]
fn seen_status_of_nothing_is_empty() {
    let conn = test_db();
    let empty: [&str; 0] = [];
    assert!(seen_status(&conn, "broker-x", &empty).expect("status").is_empty());
}

#[test]
fn unseen_count_tracks_marks() {
    let conn = test_db();
    let created = seed_transaction(&conn, "tx-1");
    let n1 = note(&conn, "tx-1", "1", false);
    note(&conn, "tx-1", "2", false);

    assert_eq!(unseen_count(&conn, "broker-1", "tx-1").expect("count"), 3);

    mark_seen(&conn, "broker-1", &created.id).expect("mark");
    mark_seen(&conn, "broker-1", &n1.id).expect("mark");
    assert_eq!(unseen_count(&conn, "broker-1", "tx-1").expect("count"), 1);

    assert_eq!(mark_all_seen(&conn, "broker-1", "tx-1").expect("mark all"), 1);
    assert_eq!(unseen_count(&conn, "broker-1", "tx-1").expect("count"), 0);
}

#[test]
fn earlier_marks_survive_later_entries() {
    let conn = test_db();
    let created = seed_transaction(&conn, "tx-1");
    mark_seen(&conn, "broker-1", &created.id).expect("mark");

    let later = note(&conn, "tx-1", "correction", true);

    assert!(is_seen(&conn, "broker-1", &created.id).expect("is_seen"));
    assert!(!is_seen(&conn, "broker-1", &later.id).expect("is_seen"));
}

#[test]
fn unseen_counts_group_by_transaction() {
    let conn = test_db();
    seed_transaction(&conn, "tx-1");
    let created = seed_transaction(&conn, "tx-2");
    note(&conn, "tx-1", "1", false);
    mark_seen(&conn, "broker-1", &created.id).expect("mark");

    let counts = unseen_counts(&conn, "broker-1").expect("counts");
    assert_eq!(counts.get("tx-1"), Some(&2));
    assert_eq!(counts.get("tx-2"), None);
}

#[test]
fn clear_seen_only_touches_one_broker() {
    let conn = test_db();
    let entry = seed_transaction(&conn, "tx-1");
    mark_seen(&conn, "broker-x", &entry.id).expect("mark x");
    mark_seen(&conn, "broker-y", &entry.id).expect("mark y");

    assert_eq!(clear_seen(&conn, "broker-x").expect("clear"), 1);
    assert!(!is_seen(&conn, "broker-x", &entry.id).expect("is_seen"));
    assert!(is_seen(&conn, "broker-y", &entry.id).expect("is_seen"));
}

// ── rendering ────────────────────────────────────────────────────────

#[test]
fn render_attaches_known_names_and_degrades_otherwise() {
    let conn = test_db();
    seed_transaction(&conn, "tx-1");
    append_entry(&conn, &NewTimelineEntry::new("tx-1", TimelineEvent::TransactionNote))
        .expect("system entry");

    let entries = list_for_transaction(&conn, "tx-1", Audience::Broker, SortOrder::OldestFirst)
        .expect("list");

    let mut names = HashMap::new();
    names.insert("broker-1".to_string(), "Dana Broker".to_string());

    let items = render_timeline(entries.clone(), &names);
    assert_eq!(items[0].actor_name.as_deref(), Some("Dana Broker"));
    assert_eq!(items[1].actor_name, None);

    let unnamed = render_timeline(entries, &NoDirectory);
    assert!(unnamed.iter().all(|item| item.actor_name.is_none()));
}
