//! Whole-database export and merge-import
//!
//! Export serializes every live and shadow table into one JSON document.
//! Import merges a document back: rows whose ids already exist are skipped,
//! the rest are inserted with their original ids, all inside one
//! transaction. Admin accounts are never exported or imported.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::events::{EventBackupRow, EventRow};
use crate::db::households::{HouseholdBackupRow, HouseholdRow, MemberBackupRow, MemberRow};
use crate::db::requests::{RequestBackupRow, RequestRow};
use crate::error::PortalError;

/// Export format version
pub const EXPORT_VERSION: u32 = 1;

/// Everything the portal persists, minus credentials
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportDocument {
    pub version: u32,
    pub requests: Vec<RequestRow>,
    pub backup_requests: Vec<RequestBackupRow>,
    pub events: Vec<EventRow>,
    pub backup_events: Vec<EventBackupRow>,
    pub households: Vec<HouseholdRow>,
    pub backup_households: Vec<HouseholdBackupRow>,
    pub household_members: Vec<MemberRow>,
    pub backup_household_members: Vec<MemberBackupRow>,
}

/// Result of a merge-import
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub inserted: u64,
    pub skipped: u64,
    pub errors: Vec<String>,
}

fn select_all<T>(
    conn: &Connection,
    sql: &str,
    f: fn(&Row) -> Result<T, rusqlite::Error>,
) -> Result<Vec<T>, PortalError> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| PortalError::Database(format!("Prepare failed: {}", e)))?;

    let rows = stmt
        .query_map([], f)
        .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| PortalError::Database(format!("Row parse failed: {}", e)))
}

/// Serialize every table into an export document
pub fn export_all(conn: &Connection) -> Result<ExportDocument, PortalError> {
    Ok(ExportDocument {
        version: EXPORT_VERSION,
        requests: select_all(conn, "SELECT * FROM requests ORDER BY id", RequestRow::from_row)?,
        backup_requests: select_all(
            conn,
            "SELECT * FROM backup_requests ORDER BY id",
            RequestBackupRow::from_row,
        )?,
        events: select_all(conn, "SELECT * FROM events ORDER BY id", EventRow::from_row)?,
        backup_events: select_all(
            conn,
            "SELECT * FROM backup_events ORDER BY id",
            EventBackupRow::from_row,
        )?,
        households: select_all(
            conn,
            "SELECT * FROM households ORDER BY id",
            HouseholdRow::from_row,
        )?,
        backup_households: select_all(
            conn,
            "SELECT * FROM backup_households ORDER BY id",
            HouseholdBackupRow::from_row,
        )?,
        household_members: select_all(
            conn,
            "SELECT * FROM household_members ORDER BY id",
            MemberRow::from_row,
        )?,
        backup_household_members: select_all(
            conn,
            "SELECT * FROM backup_household_members ORDER BY id",
            MemberBackupRow::from_row,
        )?,
    })
}

/// Merge an export document into the database
pub fn import_all(
    conn: &mut Connection,
    doc: ExportDocument,
) -> Result<ImportReport, PortalError> {
    if doc.version != EXPORT_VERSION {
        return Err(PortalError::Validation(format!(
            "unsupported export version {}",
            doc.version
        )));
    }

    let tx = conn
        .transaction()
        .map_err(|e| PortalError::Database(format!("Transaction failed: {}", e)))?;

    let mut report = ImportReport::default();

    {
        let mut import_row = |table: &str,
                              id: i64,
                              insert: &dyn Fn() -> Result<usize, rusqlite::Error>|
         -> Result<(), PortalError> {
            let exists: bool = tx
                .query_row(
                    &format!("SELECT 1 FROM {} WHERE id = ?", table),
                    params![id],
                    |_| Ok(true),
                )
                .unwrap_or(false);

            if exists {
                report.skipped += 1;
                return Ok(());
            }

            match insert() {
                Ok(_) => report.inserted += 1,
                Err(e) => report.errors.push(format!("{} {}: {}", table, id, e)),
            }
            Ok(())
        };

        for row in &doc.requests {
            import_row("requests", row.id, &|| {
                tx.execute(
                    r#"
                    INSERT INTO requests (
                        id, last_name, first_name, middle_name, address,
                        contact_number, email, certificate_type, purpose,
                        status, created_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                    params![
                        row.id,
                        row.last_name,
                        row.first_name,
                        row.middle_name,
                        row.address,
                        row.contact_number,
                        row.email,
                        row.certificate_type,
                        row.purpose,
                        row.status,
                        row.created_at,
                    ],
                )
            })?;
        }

        for row in &doc.backup_requests {
            import_row("backup_requests", row.id, &|| {
                tx.execute(
                    r#"
                    INSERT INTO backup_requests (
                        id, original_id, backup_type, last_name, first_name,
                        middle_name, address, contact_number, email,
                        certificate_type, purpose, status, created_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                    params![
                        row.id,
                        row.original_id,
                        row.backup_type,
                        row.last_name,
                        row.first_name,
                        row.middle_name,
                        row.address,
                        row.contact_number,
                        row.email,
                        row.certificate_type,
                        row.purpose,
                        row.status,
                        row.created_at,
                    ],
                )
            })?;
        }

        for row in &doc.events {
            import_row("events", row.id, &|| {
                tx.execute(
                    r#"
                    INSERT INTO events (
                        id, title, description, location, event_date,
                        image_path, created_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?)
                    "#,
                    params![
                        row.id,
                        row.title,
                        row.description,
                        row.location,
                        row.event_date,
                        row.image_path,
                        row.created_at,
                    ],
                )
            })?;
        }

        for row in &doc.backup_events {
            import_row("backup_events", row.id, &|| {
                tx.execute(
                    r#"
                    INSERT INTO backup_events (
                        id, original_id, backup_type, title, description,
                        location, event_date, image_path, created_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                    params![
                        row.id,
                        row.original_id,
                        row.backup_type,
                        row.title,
                        row.description,
                        row.location,
                        row.event_date,
                        row.image_path,
                        row.created_at,
                    ],
                )
            })?;
        }

        for row in &doc.households {
            import_row("households", row.id, &|| {
                tx.execute(
                    r#"
                    INSERT INTO households (
                        id, head_last_name, head_first_name, head_middle_name,
                        purok, address, contact_number, status, created_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                    params![
                        row.id,
                        row.head_last_name,
                        row.head_first_name,
                        row.head_middle_name,
                        row.purok,
                        row.address,
                        row.contact_number,
                        row.status,
                        row.created_at,
                    ],
                )
            })?;
        }

        for row in &doc.backup_households {
            import_row("backup_households", row.id, &|| {
                tx.execute(
                    r#"
                    INSERT INTO backup_households (
                        id, original_id, backup_type, head_last_name,
                        head_first_name, head_middle_name, purok, address,
                        contact_number, status, created_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                    params![
                        row.id,
                        row.original_id,
                        row.backup_type,
                        row.head_last_name,
                        row.head_first_name,
                        row.head_middle_name,
                        row.purok,
                        row.address,
                        row.contact_number,
                        row.status,
                        row.created_at,
                    ],
                )
            })?;
        }

        for row in &doc.household_members {
            import_row("household_members", row.id, &|| {
                tx.execute(
                    r#"
                    INSERT INTO household_members (
                        id, household_id, last_name, first_name, middle_name,
                        birthdate, sex, civil_status, relationship, created_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                    params![
                        row.id,
                        row.household_id,
                        row.last_name,
                        row.first_name,
                        row.middle_name,
                        row.birthdate,
                        row.sex,
                        row.civil_status,
                        row.relationship,
                        row.created_at,
                    ],
                )
            })?;
        }

        for row in &doc.backup_household_members {
            import_row("backup_household_members", row.id, &|| {
                tx.execute(
                    r#"
                    INSERT INTO backup_household_members (
                        id, original_id, backup_type, household_id, last_name,
                        first_name, middle_name, birthdate, sex, civil_status,
                        relationship, created_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                    params![
                        row.id,
                        row.original_id,
                        row.backup_type,
                        row.household_id,
                        row.last_name,
                        row.first_name,
                        row.middle_name,
                        row.birthdate,
                        row.sex,
                        row.civil_status,
                        row.relationship,
                        row.created_at,
                    ],
                )
            })?;
        }
    }

    tx.commit()
        .map_err(|e| PortalError::Database(format!("Commit failed: {}", e)))?;

    info!(
        inserted = report.inserted,
        skipped = report.skipped,
        errors = report.errors.len(),
        "Import finished"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::requests::{create_request, CertificateType, CreateRequestInput};

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::schema::init_schema(&conn).unwrap();
        conn
    }

    fn seed(conn: &mut Connection) {
        create_request(
            conn,
            CreateRequestInput {
                last_name: "Cruz".to_string(),
                first_name: "Ana".to_string(),
                middle_name: None,
                address: "Purok 2".to_string(),
                contact_number: "09171234567".to_string(),
                email: None,
                certificate_type: CertificateType::Residency,
                purpose: "school".to_string(),
            },
        )
        .unwrap();
    }

    #[test]
    fn test_export_import_round_trip() {
        let mut source = test_conn();
        seed(&mut source);

        let doc = export_all(&source).unwrap();
        assert_eq!(doc.requests.len(), 1);
        assert_eq!(doc.backup_requests.len(), 1);

        let mut target = test_conn();
        let report = import_all(&mut target, doc).unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(report.skipped, 0);
        assert!(report.errors.is_empty());

        let round = export_all(&target).unwrap();
        assert_eq!(round.requests[0].last_name, "Cruz");
        assert_eq!(round.requests[0].id, export_all(&source).unwrap().requests[0].id);
    }

    #[test]
    fn test_import_skips_existing_rows() {
        let mut conn = test_conn();
        seed(&mut conn);

        let doc = export_all(&conn).unwrap();
        let report = import_all(&mut conn, doc).unwrap();
        assert_eq!(report.inserted, 0);
        assert_eq!(report.skipped, 2);
    }

    #[test]
    fn test_import_rejects_unknown_version() {
        let mut conn = test_conn();
        let mut doc = export_all(&conn).unwrap();
        doc.version = 99;

        match import_all(&mut conn, doc) {
            Err(PortalError::Validation(_)) => {}
            other => panic!("expected Validation, got {:?}", other),
        }
    }
}
