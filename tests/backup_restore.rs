//! Integration tests for the record backup/restore lifecycle
//!
//! These exercise the shadow-store guarantees end to end against an
//! in-memory database: every mutation leaves a snapshot, deletes are
//! transactional with their snapshot, and restore consumes snapshots
//! one item at a time.

use barangay_portal::backup::BackupType;
use barangay_portal::db::requests::{
    self, CertificateType, CreateRequestInput, RequestStatus, UpdateRequestInput,
};
use barangay_portal::db::PortalDb;
use barangay_portal::error::PortalError;

fn open_db() -> PortalDb {
    PortalDb::open_in_memory().unwrap()
}

fn cruz_ana() -> CreateRequestInput {
    CreateRequestInput {
        last_name: "Cruz".to_string(),
        first_name: "Ana".to_string(),
        middle_name: None,
        address: "Purok 2, Mabini St.".to_string(),
        contact_number: "09171234567".to_string(),
        email: Some("ana.cruz@example.com".to_string()),
        certificate_type: CertificateType::Clearance,
        purpose: "employment".to_string(),
    }
}

/// Hide or expose the shadow table to simulate a failing backup write.
fn set_shadow_table_hidden(db: &PortalDb, hidden: bool) {
    let sql = if hidden {
        "ALTER TABLE backup_requests RENAME TO backup_requests_hidden"
    } else {
        "ALTER TABLE backup_requests_hidden RENAME TO backup_requests"
    };
    db.with_conn(|conn| {
        conn.execute(sql, [])
            .map_err(|e| PortalError::Database(e.to_string()))?;
        Ok(())
    })
    .unwrap();
}

#[test]
fn shadow_on_delete_invariant() {
    let db = open_db();

    let row = db
        .with_conn_mut(|conn| requests::create_request(conn, cruz_ana()))
        .unwrap();

    db.with_conn_mut(|conn| requests::delete_request(conn, row.id))
        .unwrap();

    // record gone
    let live = db
        .with_conn(|conn| requests::get_request(conn, row.id))
        .unwrap();
    assert!(live.is_none());

    // exactly one delete-type shadow, field-identical to the pre-delete state
    let deletes: Vec<_> = db
        .with_conn(requests::list_request_backups)
        .unwrap()
        .into_iter()
        .filter(|b| b.original_id == row.id && b.backup_type == BackupType::Delete)
        .collect();
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].last_name, row.last_name);
    assert_eq!(deletes[0].purpose, row.purpose);
    assert_eq!(deletes[0].status, row.status);
    assert_eq!(deletes[0].created_at, row.created_at);
}

#[test]
fn delete_rolls_back_when_shadow_write_fails() {
    let db = open_db();

    let row = db
        .with_conn_mut(|conn| requests::create_request(conn, cruz_ana()))
        .unwrap();

    set_shadow_table_hidden(&db, true);

    let result = db.with_conn_mut(|conn| requests::delete_request(conn, row.id));
    match result {
        Err(PortalError::BackupWrite(_)) => {}
        other => panic!("expected BackupWrite, got {:?}", other),
    }

    set_shadow_table_hidden(&db, false);

    // the record survived the failed delete
    let live = db
        .with_conn(|conn| requests::get_request(conn, row.id))
        .unwrap();
    assert!(live.is_some());

    // and no delete-type shadow was left behind
    let backups = db.with_conn(requests::list_request_backups).unwrap();
    assert!(backups.iter().all(|b| b.backup_type == BackupType::Create));
}

#[test]
fn create_rolls_back_when_shadow_write_fails() {
    let db = open_db();

    set_shadow_table_hidden(&db, true);

    let result = db.with_conn_mut(|conn| requests::create_request(conn, cruz_ana()));
    match result {
        Err(PortalError::BackupWrite(_)) => {}
        other => panic!("expected BackupWrite, got {:?}", other),
    }

    set_shadow_table_hidden(&db, false);

    let rows = db
        .with_conn(|conn| requests::list_requests(conn, &Default::default()))
        .unwrap();
    assert!(rows.is_empty());
}

#[test]
fn update_accumulates_snapshots() {
    let db = open_db();

    let row = db
        .with_conn_mut(|conn| requests::create_request(conn, cruz_ana()))
        .unwrap();

    for purpose in ["travel", "scholarship", "bank loan"] {
        db.with_conn_mut(|conn| {
            requests::update_request(
                conn,
                row.id,
                UpdateRequestInput {
                    purpose: Some(purpose.to_string()),
                    ..Default::default()
                },
            )
        })
        .unwrap();
    }

    let updates: Vec<_> = db
        .with_conn(requests::list_request_backups)
        .unwrap()
        .into_iter()
        .filter(|b| b.backup_type == BackupType::Update)
        .collect();

    // three distinct snapshots, not one overwritten row
    assert_eq!(updates.len(), 3);
    let mut purposes: Vec<_> = updates.iter().map(|b| b.purpose.clone()).collect();
    purposes.sort();
    assert_eq!(purposes, vec!["bank loan", "scholarship", "travel"]);
}

#[test]
fn restore_round_trip_and_re_restore_rejection() {
    let db = open_db();
    let policy = requests::default_restore_policy(true);

    let row = db
        .with_conn_mut(|conn| requests::create_request(conn, cruz_ana()))
        .unwrap();
    db.with_conn_mut(|conn| requests::delete_request(conn, row.id))
        .unwrap();

    let shadow_id = db
        .with_conn(requests::list_request_backups)
        .unwrap()
        .into_iter()
        .find(|b| b.backup_type == BackupType::Delete)
        .unwrap()
        .id;

    let report = db
        .with_conn_mut(|conn| Ok(requests::restore_requests(conn, &[shadow_id], &policy)))
        .unwrap();
    assert_eq!(report.success_count(), 1);

    let restored = db
        .with_conn(|conn| requests::get_request(conn, report.restored[0]))
        .unwrap()
        .unwrap();
    assert_eq!(restored.last_name, "Cruz");
    assert_eq!(restored.status, RequestStatus::Pending);

    // restoring the same snapshot again must fail that item with NotFound
    let again = db
        .with_conn_mut(|conn| Ok(requests::restore_requests(conn, &[shadow_id], &policy)))
        .unwrap();
    assert_eq!(again.success_count(), 0);
    assert_eq!(again.failures.len(), 1);
    assert_eq!(again.failures[0].id, shadow_id);
    assert!(again.failures[0].reason.contains("Not found"));
}

#[test]
fn restore_reports_partial_success() {
    let db = open_db();
    let policy = requests::default_restore_policy(true);

    let row = db
        .with_conn_mut(|conn| requests::create_request(conn, cruz_ana()))
        .unwrap();
    db.with_conn_mut(|conn| requests::delete_request(conn, row.id))
        .unwrap();

    let shadow_id = db
        .with_conn(requests::list_request_backups)
        .unwrap()
        .into_iter()
        .find(|b| b.backup_type == BackupType::Delete)
        .unwrap()
        .id;

    // one real snapshot, one bogus id; the real one must still restore
    let report = db
        .with_conn_mut(|conn| {
            Ok(requests::restore_requests(conn, &[9999, shadow_id], &policy))
        })
        .unwrap();

    assert_eq!(report.success_count(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].id, 9999);
}

/// The end-to-end scenario: submit, review, delete, restore from the
/// delete-type snapshot, with the create-type history left untouched.
#[test]
fn full_lifecycle_scenario() {
    let db = open_db();

    // resident submits; backend assigns an id and pending status
    let row = db
        .with_conn_mut(|conn| requests::create_request(conn, cruz_ana()))
        .unwrap();
    assert_eq!(row.status, RequestStatus::Pending);

    let backups = db.with_conn(requests::list_request_backups).unwrap();
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0].original_id, row.id);
    assert_eq!(backups[0].backup_type, BackupType::Create);

    // staff deletes the request
    db.with_conn_mut(|conn| requests::delete_request(conn, row.id))
        .unwrap();
    assert!(db
        .with_conn(|conn| requests::get_request(conn, row.id))
        .unwrap()
        .is_none());

    // now two shadows for the original id: create and delete
    let shadows: Vec<_> = db
        .with_conn(requests::list_request_backups)
        .unwrap()
        .into_iter()
        .filter(|b| b.original_id == row.id)
        .collect();
    assert_eq!(shadows.len(), 2);

    let delete_shadow_id = shadows
        .iter()
        .find(|b| b.backup_type == BackupType::Delete)
        .unwrap()
        .id;

    // restore from the delete-type shadow
    let report = db
        .with_conn_mut(|conn| {
            Ok(requests::restore_requests(
                conn,
                &[delete_shadow_id],
                &requests::default_restore_policy(true),
            ))
        })
        .unwrap();
    assert_eq!(report.success_count(), 1);

    let new_id = report.restored[0];
    assert_ne!(new_id, row.id);

    let restored = db
        .with_conn(|conn| requests::get_request(conn, new_id))
        .unwrap()
        .unwrap();
    assert_eq!(restored.last_name, "Cruz");
    assert_eq!(restored.status, RequestStatus::Pending);

    // the delete shadow is consumed; the create shadow remains untouched
    let remaining: Vec<_> = db
        .with_conn(requests::list_request_backups)
        .unwrap()
        .into_iter()
        .filter(|b| b.original_id == row.id)
        .collect();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].backup_type, BackupType::Create);
}
