use std::sync::{Arc, Barrier};
use std::thread;

use pretty_assertions::assert_eq;
use rusqlite::Connection;

use erm_core::audit::{count_audit_entries, AuditSink, NewAuditEntry, ACTION_STATUS_CHANGED};
use erm_core::db;
use erm_core::demo::seed_demo_roster;
use erm_core::domain::{Actor, IncidentStatus, ValidationDecision};
use erm_core::error::{AppError, CONFLICT, INVALID_INPUT, NOT_FOUND, TERMINAL_STATE_VIOLATION};
use erm_core::intake::SubmissionPayload;
use erm_core::lifecycle::{AssignmentTarget, LifecycleCoordinator};
use erm_core::notify::DisabledGateway;
use erm_core::repo::get_incident;
use erm_core::store::create_store_connection;

const REPORTER: Actor = Actor::User { user_id: 3 };
const RESPONDER: Actor = Actor::User { user_id: 12 };

fn payload() -> SubmissionPayload {
    SubmissionPayload {
        report_type: "medical".to_string(),
        narrative: "Elderly resident collapsed at the evacuation center".to_string(),
        location: "Covered court, Purok 3".to_string(),
        latitude: Some("10.3157".to_string()),
        longitude: Some("123.8854".to_string()),
        priority: "moderate".to_string(),
        reporter_safety: "unknown".to_string(),
    }
}

fn seeded() -> Connection {
    let mut conn = db::open_in_memory().expect("open");
    db::migrate(&mut conn).expect("migrate");
    seed_demo_roster(&mut conn).expect("seed");
    conn
}

fn in_progress(conn: &mut Connection) -> i64 {
    let mut lc = LifecycleCoordinator::new(conn, &DisabledGateway);
    let id = lc.submit(&payload(), 3, REPORTER).expect("submit").id;
    lc.validate(id, ValidationDecision::Validated, None, None, RESPONDER)
        .expect("validate");
    id
}

#[test]
fn resolving_twice_is_a_terminal_violation() {
    let mut conn = seeded();
    let id = in_progress(&mut conn);

    let mut lc = LifecycleCoordinator::new(&mut conn, &DisabledGateway);
    let resolved = lc
        .update_status(id, IncidentStatus::Resolved, Some("patient transported"), RESPONDER)
        .expect("resolve");
    assert_eq!(resolved.status, IncidentStatus::Resolved);
    assert_eq!(resolved.status_notes.as_deref(), Some("patient transported"));

    let err = lc
        .update_status(id, IncidentStatus::Resolved, None, RESPONDER)
        .unwrap_err();
    assert_eq!(err.code, TERMINAL_STATE_VIOLATION);
    assert!(!err.retryable);

    let trail = lc.audit_trail(id).unwrap();
    let last = trail.last().unwrap();
    assert_eq!(last.action, ACTION_STATUS_CHANGED);
    assert_eq!(last.detail, "status=in_progress->resolved; notes=patient transported");
}

#[test]
fn terminal_incident_rejects_every_mutation_unchanged() {
    let mut conn = seeded();
    let id = in_progress(&mut conn);
    let fire: i64 = conn
        .query_row("SELECT id FROM teams WHERE name = 'Fire Station 1'", [], |r| r.get(0))
        .unwrap();

    let mut lc = LifecycleCoordinator::new(&mut conn, &DisabledGateway);
    let closed = lc
        .update_status(id, IncidentStatus::Closed, None, RESPONDER)
        .unwrap();
    let entries_before = lc.audit_trail(id).unwrap().len();

    let attempts: Vec<AppError> = vec![
        lc.update_status(id, IncidentStatus::InProgress, None, RESPONDER)
            .unwrap_err(),
        lc.update_status(id, IncidentStatus::Closed, Some("again"), RESPONDER)
            .unwrap_err(),
        lc.validate(id, ValidationDecision::Validated, Some("late"), None, RESPONDER)
            .unwrap_err(),
        lc.validate(
            id,
            ValidationDecision::Validated,
            None,
            Some(AssignmentTarget::Team(fire)),
            RESPONDER,
        )
        .unwrap_err(),
        lc.validate(
            id,
            ValidationDecision::Rejected,
            None,
            Some(AssignmentTarget::Team(fire)),
            RESPONDER,
        )
        .unwrap_err(),
        lc.assign_team(id, Some(fire), RESPONDER).unwrap_err(),
        lc.assign_team(id, None, RESPONDER).unwrap_err(),
        lc.assign_staff(id, None, RESPONDER).unwrap_err(),
    ];
    for err in &attempts {
        assert_eq!(err.code, TERMINAL_STATE_VIOLATION, "{err}");
    }

    assert_eq!(lc.incident(id).unwrap(), closed);
    assert_eq!(lc.audit_trail(id).unwrap().len(), entries_before);
}

#[test]
fn skipping_states_is_invalid_input() {
    let mut conn = seeded();
    let mut lc = LifecycleCoordinator::new(&mut conn, &DisabledGateway);
    let id = lc.submit(&payload(), 3, REPORTER).unwrap().id;

    let err = lc
        .update_status(id, IncidentStatus::Resolved, None, RESPONDER)
        .unwrap_err();
    assert_eq!(err.code, INVALID_INPUT);
    assert_eq!(err.fields, vec!["status".to_string()]);

    let same = lc
        .update_status(id, IncidentStatus::Pending, None, RESPONDER)
        .unwrap();
    assert_eq!(same.version, 1);

    let err = lc
        .update_status(4_242, IncidentStatus::Closed, None, RESPONDER)
        .unwrap_err();
    assert_eq!(err.code, NOT_FOUND);

    let err = lc
        .validate(
            4_242,
            ValidationDecision::Rejected,
            None,
            Some(AssignmentTarget::Team(1)),
            RESPONDER,
        )
        .unwrap_err();
    assert_eq!(err.code, NOT_FOUND);
}

struct BrokenAuditSink;

impl AuditSink for BrokenAuditSink {
    fn append(&self, _conn: &Connection, _entry: &NewAuditEntry) -> Result<i64, AppError> {
        Err(AppError::new("AUDIT_APPEND_FAILED", "disk full"))
    }
}

#[test]
fn audit_failure_does_not_undo_committed_change() {
    let mut conn = seeded();
    let sink = BrokenAuditSink;

    let id = {
        let mut lc =
            LifecycleCoordinator::new(&mut conn, &DisabledGateway).with_audit_sink(&sink);
        let id = lc
            .submit(&payload(), 3, REPORTER)
            .expect("submit despite audit failure")
            .id;
        let rec = lc
            .validate(id, ValidationDecision::Validated, None, None, RESPONDER)
            .expect("validate despite audit failure")
            .record;
        assert_eq!(rec.status, IncidentStatus::InProgress);
        id
    };

    assert_eq!(get_incident(&conn, id).unwrap().status, IncidentStatus::InProgress);
    assert_eq!(count_audit_entries(&conn, id).unwrap(), 0);
}

#[test]
fn audit_table_failure_is_swallowed() {
    let mut conn = seeded();
    let id = in_progress(&mut conn);
    conn.execute_batch(
        r#"
        CREATE TRIGGER refuse_audit BEFORE INSERT ON audit_entries
        BEGIN
          SELECT RAISE(ABORT, 'audit store offline');
        END;
        "#,
    )
    .unwrap();

    let mut lc = LifecycleCoordinator::new(&mut conn, &DisabledGateway);
    let rec = lc
        .update_status(id, IncidentStatus::Resolved, None, RESPONDER)
        .expect("resolve");
    assert_eq!(rec.status, IncidentStatus::Resolved);
    assert_eq!(lc.incident(id).unwrap().status, IncidentStatus::Resolved);
}

#[test]
fn audit_entries_cannot_be_edited_or_deleted() {
    let mut conn = seeded();
    let id = in_progress(&mut conn);

    assert!(conn
        .execute("UPDATE audit_entries SET detail = 'x' WHERE incident_id = ?1", [id])
        .is_err());
    assert!(conn
        .execute("DELETE FROM audit_entries WHERE incident_id = ?1", [id])
        .is_err());
    assert_eq!(count_audit_entries(&conn, id).unwrap(), 2);
}

#[test]
fn concurrent_terminal_transitions_have_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("incidents.sqlite3");

    let id = {
        let mut conn = create_store_connection(&path, 5_000).expect("create store");
        in_progress(&mut conn)
    };

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = [IncidentStatus::Resolved, IncidentStatus::Closed]
        .into_iter()
        .map(|target| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut conn = db::open_with_busy_timeout(&path, 5_000).expect("open");
                barrier.wait();
                let mut lc = LifecycleCoordinator::new(&mut conn, &DisabledGateway);
                lc.update_status(id, target, None, RESPONDER)
            })
        })
        .collect();

    let results: Vec<Result<_, AppError>> = handles
        .into_iter()
        .map(|h| h.join().expect("thread"))
        .collect();

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    let loser = results
        .iter()
        .find_map(|r| r.as_ref().err())
        .expect("one loser");
    assert!(
        loser.code == TERMINAL_STATE_VIOLATION || loser.code == CONFLICT,
        "unexpected error: {loser}"
    );

    let conn = db::open(&path).unwrap();
    let stored = get_incident(&conn, id).unwrap();
    assert_eq!(stored.status, winners[0].status);
    assert_eq!(stored.version, winners[0].version);
}
