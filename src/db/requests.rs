//! Certificate request CRUD with shadow snapshots
//!
//! Every mutation writes a `backup_requests` row in the same transaction as
//! the primary write. A failed snapshot aborts the mutation.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backup::{self, BackupType, RestorePolicy, RestoreReport};
use crate::error::PortalError;

/// Review status of a certificate request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "approved")]
    Approved,
    #[serde(rename = "rejected")]
    Rejected,
    #[serde(rename = "for pickup")]
    ForPickup,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::ForPickup => "for pickup",
        }
    }

    pub fn parse(s: &str) -> Result<Self, PortalError> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            "for pickup" => Ok(RequestStatus::ForPickup),
            other => Err(PortalError::Validation(format!(
                "unknown request status: {other}"
            ))),
        }
    }
}

impl FromSql for RequestStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        RequestStatus::parse(s).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for RequestStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

/// Kind of certificate a resident can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateType {
    Clearance,
    Residency,
    Indigency,
    BusinessPermit,
}

impl CertificateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateType::Clearance => "clearance",
            CertificateType::Residency => "residency",
            CertificateType::Indigency => "indigency",
            CertificateType::BusinessPermit => "business_permit",
        }
    }

    pub fn parse(s: &str) -> Result<Self, PortalError> {
        match s {
            "clearance" => Ok(CertificateType::Clearance),
            "residency" => Ok(CertificateType::Residency),
            "indigency" => Ok(CertificateType::Indigency),
            "business_permit" => Ok(CertificateType::BusinessPermit),
            other => Err(PortalError::Validation(format!(
                "unknown certificate type: {other}"
            ))),
        }
    }

    /// Display name used on the issued certificate
    pub fn display_name(&self) -> &'static str {
        match self {
            CertificateType::Clearance => "Barangay Clearance",
            CertificateType::Residency => "Certificate of Residency",
            CertificateType::Indigency => "Certificate of Indigency",
            CertificateType::BusinessPermit => "Barangay Business Permit",
        }
    }
}

impl FromSql for CertificateType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        CertificateType::parse(s).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for CertificateType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

/// Certificate request row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRow {
    pub id: i64,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub address: String,
    pub contact_number: String,
    pub email: Option<String>,
    pub certificate_type: CertificateType,
    pub purpose: String,
    pub status: RequestStatus,
    pub created_at: String,
}

impl RequestRow {
    pub(crate) fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            last_name: row.get("last_name")?,
            first_name: row.get("first_name")?,
            middle_name: row.get("middle_name")?,
            address: row.get("address")?,
            contact_number: row.get("contact_number")?,
            email: row.get("email")?,
            certificate_type: row.get("certificate_type")?,
            purpose: row.get("purpose")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Snapshot row from `backup_requests`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBackupRow {
    pub id: i64,
    pub original_id: i64,
    pub backup_type: BackupType,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub address: String,
    pub contact_number: String,
    pub email: Option<String>,
    pub certificate_type: CertificateType,
    pub purpose: String,
    pub status: RequestStatus,
    pub created_at: String,
}

impl RequestBackupRow {
    pub(crate) fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            original_id: row.get("original_id")?,
            backup_type: row.get("backup_type")?,
            last_name: row.get("last_name")?,
            first_name: row.get("first_name")?,
            middle_name: row.get("middle_name")?,
            address: row.get("address")?,
            contact_number: row.get("contact_number")?,
            email: row.get("email")?,
            certificate_type: row.get("certificate_type")?,
            purpose: row.get("purpose")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Input for a public certificate request submission
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRequestInput {
    pub last_name: String,
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub address: String,
    pub contact_number: String,
    #[serde(default)]
    pub email: Option<String>,
    pub certificate_type: CertificateType,
    pub purpose: String,
}

impl CreateRequestInput {
    pub fn validate(&self) -> Result<(), PortalError> {
        for (field, value) in [
            ("last_name", &self.last_name),
            ("first_name", &self.first_name),
            ("address", &self.address),
            ("contact_number", &self.contact_number),
            ("purpose", &self.purpose),
        ] {
            if value.trim().is_empty() {
                return Err(PortalError::Validation(format!("{field} is required")));
            }
        }
        Ok(())
    }
}

/// Input for an admin update; absent fields keep their current value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRequestInput {
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub certificate_type: Option<CertificateType>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub status: Option<RequestStatus>,
}

/// Query parameters for listing requests
#[derive(Debug, Clone, Deserialize)]
pub struct RequestQuery {
    #[serde(default)]
    pub status: Option<RequestStatus>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl Default for RequestQuery {
    fn default() -> Self {
        Self {
            status: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

fn default_limit() -> u32 {
    100
}

/// Default restore policy for requests: restored rows re-enter the review
/// queue as `pending` and keep the snapshot's timestamp.
pub fn default_restore_policy(reset_status: bool) -> RestorePolicy {
    if reset_status {
        RestorePolicy::reset_to("pending")
    } else {
        RestorePolicy::preserve()
    }
}

/// Write a snapshot of `row` into the shadow table.
///
/// `created_at` carries the original record's timestamp into delete-type
/// snapshots; `None` stamps the snapshot time (create/update).
fn snapshot_request(
    conn: &Connection,
    row: &RequestRow,
    backup_type: BackupType,
    created_at: Option<&str>,
) -> Result<(), PortalError> {
    let result = match created_at {
        Some(ts) => conn.execute(
            r#"
            INSERT INTO backup_requests (
                original_id, backup_type, last_name, first_name, middle_name,
                address, contact_number, email, certificate_type, purpose,
                status, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                row.id,
                backup_type,
                row.last_name,
                row.first_name,
                row.middle_name,
                row.address,
                row.contact_number,
                row.email,
                row.certificate_type,
                row.purpose,
                row.status,
                ts,
            ],
        ),
        None => conn.execute(
            r#"
            INSERT INTO backup_requests (
                original_id, backup_type, last_name, first_name, middle_name,
                address, contact_number, email, certificate_type, purpose,
                status
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                row.id,
                backup_type,
                row.last_name,
                row.first_name,
                row.middle_name,
                row.address,
                row.contact_number,
                row.email,
                row.certificate_type,
                row.purpose,
                row.status,
            ],
        ),
    };

    result.map_err(|e| PortalError::BackupWrite(format!("request snapshot failed: {}", e)))?;
    Ok(())
}

/// Get request by ID
pub fn get_request(conn: &Connection, id: i64) -> Result<Option<RequestRow>, PortalError> {
    let mut stmt = conn
        .prepare("SELECT * FROM requests WHERE id = ?")
        .map_err(|e| PortalError::Database(format!("Prepare failed: {}", e)))?;

    let mut rows = stmt
        .query(params![id])
        .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))?;

    match rows
        .next()
        .map_err(|e| PortalError::Database(format!("Row fetch failed: {}", e)))?
    {
        Some(row) => Ok(Some(RequestRow::from_row(row).map_err(|e| {
            PortalError::Database(format!("Row parse failed: {}", e))
        })?)),
        None => Ok(None),
    }
}

/// List requests, newest first, with optional status filter
pub fn list_requests(
    conn: &Connection,
    query: &RequestQuery,
) -> Result<Vec<RequestRow>, PortalError> {
    let mut sql = String::from("SELECT * FROM requests");
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![];

    if let Some(status) = query.status {
        sql.push_str(" WHERE status = ?");
        params.push(Box::new(status));
    }

    sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?");
    params.push(Box::new(query.limit as i64));
    params.push(Box::new(query.offset as i64));

    debug!("Executing query: {}", sql);

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| PortalError::Database(format!("Prepare failed: {}", e)))?;

    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

    let rows = stmt
        .query_map(param_refs.as_slice(), RequestRow::from_row)
        .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| PortalError::Database(format!("Row parse failed: {}", e)))
}

/// Create a request and its create-type snapshot in one transaction
pub fn create_request(
    conn: &mut Connection,
    input: CreateRequestInput,
) -> Result<RequestRow, PortalError> {
    input.validate()?;

    let tx = conn
        .transaction()
        .map_err(|e| PortalError::Database(format!("Transaction failed: {}", e)))?;

    tx.execute(
        r#"
        INSERT INTO requests (
            last_name, first_name, middle_name, address, contact_number,
            email, certificate_type, purpose
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            input.last_name,
            input.first_name,
            input.middle_name,
            input.address,
            input.contact_number,
            input.email,
            input.certificate_type,
            input.purpose,
        ],
    )
    .map_err(|e| PortalError::Database(format!("Insert failed: {}", e)))?;

    let id = tx.last_insert_rowid();
    let row = get_request(&tx, id)?
        .ok_or_else(|| PortalError::Internal("Request not found after insert".to_string()))?;

    snapshot_request(&tx, &row, BackupType::Create, Some(&row.created_at))?;

    tx.commit()
        .map_err(|e| PortalError::Database(format!("Commit failed: {}", e)))?;

    Ok(row)
}

/// Update a request; each call writes a fresh update-type snapshot
pub fn update_request(
    conn: &mut Connection,
    id: i64,
    input: UpdateRequestInput,
) -> Result<RequestRow, PortalError> {
    let tx = conn
        .transaction()
        .map_err(|e| PortalError::Database(format!("Transaction failed: {}", e)))?;

    let current = get_request(&tx, id)?
        .ok_or_else(|| PortalError::NotFound(format!("request {id}")))?;

    let updated = RequestRow {
        id: current.id,
        last_name: input.last_name.unwrap_or(current.last_name),
        first_name: input.first_name.unwrap_or(current.first_name),
        middle_name: input.middle_name.or(current.middle_name),
        address: input.address.unwrap_or(current.address),
        contact_number: input.contact_number.unwrap_or(current.contact_number),
        email: input.email.or(current.email),
        certificate_type: input.certificate_type.unwrap_or(current.certificate_type),
        purpose: input.purpose.unwrap_or(current.purpose),
        status: input.status.unwrap_or(current.status),
        created_at: current.created_at,
    };

    tx.execute(
        r#"
        UPDATE requests SET
            last_name = ?, first_name = ?, middle_name = ?, address = ?,
            contact_number = ?, email = ?, certificate_type = ?, purpose = ?,
            status = ?
        WHERE id = ?
        "#,
        params![
            updated.last_name,
            updated.first_name,
            updated.middle_name,
            updated.address,
            updated.contact_number,
            updated.email,
            updated.certificate_type,
            updated.purpose,
            updated.status,
            id,
        ],
    )
    .map_err(|e| PortalError::Database(format!("Update failed: {}", e)))?;

    snapshot_request(&tx, &updated, BackupType::Update, None)?;

    tx.commit()
        .map_err(|e| PortalError::Database(format!("Commit failed: {}", e)))?;

    Ok(updated)
}

/// Transition an approved request to `for pickup` when its certificate is issued
pub fn mark_for_pickup(conn: &mut Connection, id: i64) -> Result<RequestRow, PortalError> {
    let tx = conn
        .transaction()
        .map_err(|e| PortalError::Database(format!("Transaction failed: {}", e)))?;

    let mut row = get_request(&tx, id)?
        .ok_or_else(|| PortalError::NotFound(format!("request {id}")))?;

    if row.status != RequestStatus::Approved {
        return Err(PortalError::Validation(format!(
            "request {id} is {}, only approved requests can be issued",
            row.status.as_str()
        )));
    }

    row.status = RequestStatus::ForPickup;

    tx.execute(
        "UPDATE requests SET status = ? WHERE id = ?",
        params![row.status, id],
    )
    .map_err(|e| PortalError::Database(format!("Update failed: {}", e)))?;

    snapshot_request(&tx, &row, BackupType::Update, None)?;

    tx.commit()
        .map_err(|e| PortalError::Database(format!("Commit failed: {}", e)))?;

    Ok(row)
}

/// Delete a request, capturing its pre-delete state with the original timestamp
pub fn delete_request(conn: &mut Connection, id: i64) -> Result<(), PortalError> {
    let tx = conn
        .transaction()
        .map_err(|e| PortalError::Database(format!("Transaction failed: {}", e)))?;

    let row = get_request(&tx, id)?
        .ok_or_else(|| PortalError::NotFound(format!("request {id}")))?;

    snapshot_request(&tx, &row, BackupType::Delete, Some(&row.created_at))?;

    tx.execute("DELETE FROM requests WHERE id = ?", params![id])
        .map_err(|e| PortalError::Database(format!("Delete failed: {}", e)))?;

    tx.commit()
        .map_err(|e| PortalError::Database(format!("Commit failed: {}", e)))?;

    Ok(())
}

/// List all request snapshots, newest first
pub fn list_request_backups(conn: &Connection) -> Result<Vec<RequestBackupRow>, PortalError> {
    let mut stmt = conn
        .prepare("SELECT * FROM backup_requests ORDER BY created_at DESC, id DESC")
        .map_err(|e| PortalError::Database(format!("Prepare failed: {}", e)))?;

    let rows = stmt
        .query_map([], RequestBackupRow::from_row)
        .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| PortalError::Database(format!("Row parse failed: {}", e)))
}

/// Restore a set of snapshots back into the live table, one item at a time
pub fn restore_requests(
    conn: &mut Connection,
    ids: &[i64],
    policy: &RestorePolicy,
) -> RestoreReport {
    backup::restore_batch(ids, |backup_id| restore_one(conn, backup_id, policy))
}

fn restore_one(
    conn: &mut Connection,
    backup_id: i64,
    policy: &RestorePolicy,
) -> Result<i64, PortalError> {
    let tx = conn
        .transaction()
        .map_err(|e| PortalError::Database(format!("Transaction failed: {}", e)))?;

    let shadow = {
        let mut stmt = tx
            .prepare("SELECT * FROM backup_requests WHERE id = ?")
            .map_err(|e| PortalError::Database(format!("Prepare failed: {}", e)))?;
        let mut rows = stmt
            .query(params![backup_id])
            .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))?;
        match rows
            .next()
            .map_err(|e| PortalError::Database(format!("Row fetch failed: {}", e)))?
        {
            Some(row) => RequestBackupRow::from_row(row)
                .map_err(|e| PortalError::Database(format!("Row parse failed: {}", e)))?,
            None => return Err(PortalError::NotFound(format!("backup request {backup_id}"))),
        }
    };

    let status = match policy.reset_status_to {
        Some(s) => RequestStatus::parse(s)?,
        None => shadow.status,
    };

    if policy.preserve_created_at {
        tx.execute(
            r#"
            INSERT INTO requests (
                last_name, first_name, middle_name, address, contact_number,
                email, certificate_type, purpose, status, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                shadow.last_name,
                shadow.first_name,
                shadow.middle_name,
                shadow.address,
                shadow.contact_number,
                shadow.email,
                shadow.certificate_type,
                shadow.purpose,
                status,
                shadow.created_at,
            ],
        )
    } else {
        tx.execute(
            r#"
            INSERT INTO requests (
                last_name, first_name, middle_name, address, contact_number,
                email, certificate_type, purpose, status
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                shadow.last_name,
                shadow.first_name,
                shadow.middle_name,
                shadow.address,
                shadow.contact_number,
                shadow.email,
                shadow.certificate_type,
                shadow.purpose,
                status,
            ],
        )
    }
    .map_err(|e| PortalError::Database(format!("Restore insert failed: {}", e)))?;

    let new_id = tx.last_insert_rowid();

    tx.execute("DELETE FROM backup_requests WHERE id = ?", params![backup_id])
        .map_err(|e| PortalError::Database(format!("Snapshot consume failed: {}", e)))?;

    tx.commit()
        .map_err(|e| PortalError::Database(format!("Commit failed: {}", e)))?;

    Ok(new_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::schema::init_schema(&conn).unwrap();
        conn
    }

    fn sample_input() -> CreateRequestInput {
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

    #[test]
    fn test_create_writes_create_snapshot() {
        let mut conn = test_conn();
        let row = create_request(&mut conn, sample_input()).unwrap();

        assert_eq!(row.status, RequestStatus::Pending);

        let backups = list_request_backups(&conn).unwrap();
        assert_eq!(backups.len(), 1);
        assert_eq!(backups[0].original_id, row.id);
        assert_eq!(backups[0].backup_type, BackupType::Create);
        assert_eq!(backups[0].last_name, "Cruz");
    }

    #[test]
    fn test_updates_accumulate_snapshots() {
        let mut conn = test_conn();
        let row = create_request(&mut conn, sample_input()).unwrap();

        for purpose in ["travel", "scholarship", "loan"] {
            update_request(
                &mut conn,
                row.id,
                UpdateRequestInput {
                    purpose: Some(purpose.to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        }

        let updates: Vec<_> = list_request_backups(&conn)
            .unwrap()
            .into_iter()
            .filter(|b| b.backup_type == BackupType::Update)
            .collect();
        assert_eq!(updates.len(), 3);
    }

    #[test]
    fn test_delete_preserves_original_timestamp() {
        let mut conn = test_conn();
        let row = create_request(&mut conn, sample_input()).unwrap();

        delete_request(&mut conn, row.id).unwrap();

        assert!(get_request(&conn, row.id).unwrap().is_none());

        let delete_shadow = list_request_backups(&conn)
            .unwrap()
            .into_iter()
            .find(|b| b.backup_type == BackupType::Delete)
            .unwrap();
        assert_eq!(delete_shadow.original_id, row.id);
        assert_eq!(delete_shadow.created_at, row.created_at);
        assert_eq!(delete_shadow.status, RequestStatus::Pending);
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let mut conn = test_conn();
        match delete_request(&mut conn, 999) {
            Err(PortalError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_restore_resets_status_and_consumes_snapshot() {
        let mut conn = test_conn();
        let row = create_request(&mut conn, sample_input()).unwrap();
        update_request(
            &mut conn,
            row.id,
            UpdateRequestInput {
                status: Some(RequestStatus::Approved),
                ..Default::default()
            },
        )
        .unwrap();
        delete_request(&mut conn, row.id).unwrap();

        let shadow_id = list_request_backups(&conn)
            .unwrap()
            .into_iter()
            .find(|b| b.backup_type == BackupType::Delete)
            .unwrap()
            .id;

        let report = restore_requests(&mut conn, &[shadow_id], &default_restore_policy(true));
        assert_eq!(report.success_count(), 1);
        assert!(report.failures.is_empty());

        let restored = get_request(&conn, report.restored[0]).unwrap().unwrap();
        assert_eq!(restored.last_name, "Cruz");
        // was approved at deletion time, forced back into the review queue
        assert_eq!(restored.status, RequestStatus::Pending);
        assert_eq!(restored.created_at, row.created_at);

        // second restore of the same snapshot must fail per-item
        let again = restore_requests(&mut conn, &[shadow_id], &default_restore_policy(true));
        assert_eq!(again.success_count(), 0);
        assert_eq!(again.failures.len(), 1);
        assert!(again.failures[0].reason.contains("Not found"));
    }

    #[test]
    fn test_mark_for_pickup_requires_approved() {
        let mut conn = test_conn();
        let row = create_request(&mut conn, sample_input()).unwrap();

        match mark_for_pickup(&mut conn, row.id) {
            Err(PortalError::Validation(_)) => {}
            other => panic!("expected Validation, got {:?}", other),
        }

        update_request(
            &mut conn,
            row.id,
            UpdateRequestInput {
                status: Some(RequestStatus::Approved),
                ..Default::default()
            },
        )
        .unwrap();

        let issued = mark_for_pickup(&mut conn, row.id).unwrap();
        assert_eq!(issued.status, RequestStatus::ForPickup);
    }

    #[test]
    fn test_validation_rejects_blank_fields() {
        let mut conn = test_conn();
        let mut input = sample_input();
        input.last_name = "  ".to_string();

        match create_request(&mut conn, input) {
            Err(PortalError::Validation(msg)) => assert!(msg.contains("last_name")),
            other => panic!("expected Validation, got {:?}", other),
        }
    }
}
