//! RBI household registry CRUD with shadow snapshots
//!
//! A household and its members are captured together: deleting a household
//! snapshots the household row and every member row in the same transaction
//! before removing them. Restoring a household shadow re-creates the
//! household under a fresh id and re-homes the member snapshots that were
//! captured with it.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::backup::{self, BackupType, RestorePolicy, RestoreReport};
use crate::error::PortalError;

/// Review status of a household registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HouseholdStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "for interview")]
    ForInterview,
    #[serde(rename = "approved")]
    Approved,
    #[serde(rename = "rejected")]
    Rejected,
}

impl HouseholdStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HouseholdStatus::Pending => "pending",
            HouseholdStatus::ForInterview => "for interview",
            HouseholdStatus::Approved => "approved",
            HouseholdStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Result<Self, PortalError> {
        match s {
            "pending" => Ok(HouseholdStatus::Pending),
            "for interview" => Ok(HouseholdStatus::ForInterview),
            "approved" => Ok(HouseholdStatus::Approved),
            "rejected" => Ok(HouseholdStatus::Rejected),
            other => Err(PortalError::Validation(format!(
                "unknown household status: {other}"
            ))),
        }
    }
}

impl FromSql for HouseholdStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        HouseholdStatus::parse(s).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for HouseholdStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

/// Household row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HouseholdRow {
    pub id: i64,
    pub head_last_name: String,
    pub head_first_name: String,
    pub head_middle_name: Option<String>,
    pub purok: String,
    pub address: String,
    pub contact_number: Option<String>,
    pub status: HouseholdStatus,
    pub created_at: String,
    #[serde(default)]
    pub members: Vec<MemberRow>,
}

impl HouseholdRow {
    pub(crate) fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            head_last_name: row.get("head_last_name")?,
            head_first_name: row.get("head_first_name")?,
            head_middle_name: row.get("head_middle_name")?,
            purok: row.get("purok")?,
            address: row.get("address")?,
            contact_number: row.get("contact_number")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            members: vec![], // Loaded separately
        })
    }
}

/// Household member row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberRow {
    pub id: i64,
    pub household_id: i64,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub birthdate: Option<String>,
    pub sex: Option<String>,
    pub civil_status: Option<String>,
    pub relationship: String,
    pub created_at: String,
}

impl MemberRow {
    pub(crate) fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            household_id: row.get("household_id")?,
            last_name: row.get("last_name")?,
            first_name: row.get("first_name")?,
            middle_name: row.get("middle_name")?,
            birthdate: row.get("birthdate")?,
            sex: row.get("sex")?,
            civil_status: row.get("civil_status")?,
            relationship: row.get("relationship")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Snapshot row from `backup_households`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HouseholdBackupRow {
    pub id: i64,
    pub original_id: i64,
    pub backup_type: BackupType,
    pub head_last_name: String,
    pub head_first_name: String,
    pub head_middle_name: Option<String>,
    pub purok: String,
    pub address: String,
    pub contact_number: Option<String>,
    pub status: HouseholdStatus,
    pub created_at: String,
}

impl HouseholdBackupRow {
    pub(crate) fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            original_id: row.get("original_id")?,
            backup_type: row.get("backup_type")?,
            head_last_name: row.get("head_last_name")?,
            head_first_name: row.get("head_first_name")?,
            head_middle_name: row.get("head_middle_name")?,
            purok: row.get("purok")?,
            address: row.get("address")?,
            contact_number: row.get("contact_number")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Snapshot row from `backup_household_members`
///
/// `household_id` is the original household id at capture time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberBackupRow {
    pub id: i64,
    pub original_id: i64,
    pub backup_type: BackupType,
    pub household_id: i64,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub birthdate: Option<String>,
    pub sex: Option<String>,
    pub civil_status: Option<String>,
    pub relationship: String,
    pub created_at: String,
}

impl MemberBackupRow {
    pub(crate) fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            original_id: row.get("original_id")?,
            backup_type: row.get("backup_type")?,
            household_id: row.get("household_id")?,
            last_name: row.get("last_name")?,
            first_name: row.get("first_name")?,
            middle_name: row.get("middle_name")?,
            birthdate: row.get("birthdate")?,
            sex: row.get("sex")?,
            civil_status: row.get("civil_status")?,
            relationship: row.get("relationship")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Input for a public RBI submission
#[derive(Debug, Clone, Deserialize)]
pub struct CreateHouseholdInput {
    pub head_last_name: String,
    pub head_first_name: String,
    #[serde(default)]
    pub head_middle_name: Option<String>,
    pub purok: String,
    pub address: String,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default)]
    pub members: Vec<CreateMemberInput>,
}

impl CreateHouseholdInput {
    pub fn validate(&self) -> Result<(), PortalError> {
        for (field, value) in [
            ("head_last_name", &self.head_last_name),
            ("head_first_name", &self.head_first_name),
            ("purok", &self.purok),
            ("address", &self.address),
        ] {
            if value.trim().is_empty() {
                return Err(PortalError::Validation(format!("{field} is required")));
            }
        }
        for member in &self.members {
            member.validate()?;
        }
        Ok(())
    }
}

/// Input for adding a household member
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMemberInput {
    pub last_name: String,
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub birthdate: Option<String>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub civil_status: Option<String>,
    pub relationship: String,
}

impl CreateMemberInput {
    pub fn validate(&self) -> Result<(), PortalError> {
        for (field, value) in [
            ("last_name", &self.last_name),
            ("first_name", &self.first_name),
            ("relationship", &self.relationship),
        ] {
            if value.trim().is_empty() {
                return Err(PortalError::Validation(format!(
                    "member {field} is required"
                )));
            }
        }
        Ok(())
    }
}

/// Input for updating a household; absent fields keep their current value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateHouseholdInput {
    #[serde(default)]
    pub head_last_name: Option<String>,
    #[serde(default)]
    pub head_first_name: Option<String>,
    #[serde(default)]
    pub head_middle_name: Option<String>,
    #[serde(default)]
    pub purok: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default)]
    pub status: Option<HouseholdStatus>,
}

/// Input for updating a member; absent fields keep their current value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMemberInput {
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub birthdate: Option<String>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub civil_status: Option<String>,
    #[serde(default)]
    pub relationship: Option<String>,
}

/// Query parameters for listing households
#[derive(Debug, Clone, Deserialize)]
pub struct HouseholdQuery {
    #[serde(default)]
    pub status: Option<HouseholdStatus>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl Default for HouseholdQuery {
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

/// Default restore policy for households
pub fn default_restore_policy(reset_status: bool) -> RestorePolicy {
    if reset_status {
        RestorePolicy::reset_to("pending")
    } else {
        RestorePolicy::preserve()
    }
}

fn snapshot_household(
    conn: &Connection,
    row: &HouseholdRow,
    backup_type: BackupType,
    created_at: Option<&str>,
) -> Result<(), PortalError> {
    let result = match created_at {
        Some(ts) => conn.execute(
            r#"
            INSERT INTO backup_households (
                original_id, backup_type, head_last_name, head_first_name,
                head_middle_name, purok, address, contact_number, status,
                created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                row.id,
                backup_type,
                row.head_last_name,
                row.head_first_name,
                row.head_middle_name,
                row.purok,
                row.address,
                row.contact_number,
                row.status,
                ts,
            ],
        ),
        None => conn.execute(
            r#"
            INSERT INTO backup_households (
                original_id, backup_type, head_last_name, head_first_name,
                head_middle_name, purok, address, contact_number, status
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                row.id,
                backup_type,
                row.head_last_name,
                row.head_first_name,
                row.head_middle_name,
                row.purok,
                row.address,
                row.contact_number,
                row.status,
            ],
        ),
    };

    result.map_err(|e| PortalError::BackupWrite(format!("household snapshot failed: {}", e)))?;
    Ok(())
}

fn snapshot_member(
    conn: &Connection,
    row: &MemberRow,
    backup_type: BackupType,
    created_at: Option<&str>,
) -> Result<(), PortalError> {
    let result = match created_at {
        Some(ts) => conn.execute(
            r#"
            INSERT INTO backup_household_members (
                original_id, backup_type, household_id, last_name, first_name,
                middle_name, birthdate, sex, civil_status, relationship,
                created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                row.id,
                backup_type,
                row.household_id,
                row.last_name,
                row.first_name,
                row.middle_name,
                row.birthdate,
                row.sex,
                row.civil_status,
                row.relationship,
                ts,
            ],
        ),
        None => conn.execute(
            r#"
            INSERT INTO backup_household_members (
                original_id, backup_type, household_id, last_name, first_name,
                middle_name, birthdate, sex, civil_status, relationship
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                row.id,
                backup_type,
                row.household_id,
                row.last_name,
                row.first_name,
                row.middle_name,
                row.birthdate,
                row.sex,
                row.civil_status,
                row.relationship,
            ],
        ),
    };

    result.map_err(|e| PortalError::BackupWrite(format!("member snapshot failed: {}", e)))?;
    Ok(())
}

/// Get members of a household, insertion order
pub fn get_members(conn: &Connection, household_id: i64) -> Result<Vec<MemberRow>, PortalError> {
    let mut stmt = conn
        .prepare("SELECT * FROM household_members WHERE household_id = ? ORDER BY id")
        .map_err(|e| PortalError::Database(format!("Prepare failed: {}", e)))?;

    let rows = stmt
        .query_map(params![household_id], MemberRow::from_row)
        .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| PortalError::Database(format!("Row parse failed: {}", e)))
}

/// Get a single member by ID
pub fn get_member(conn: &Connection, id: i64) -> Result<Option<MemberRow>, PortalError> {
    let mut stmt = conn
        .prepare("SELECT * FROM household_members WHERE id = ?")
        .map_err(|e| PortalError::Database(format!("Prepare failed: {}", e)))?;

    let mut rows = stmt
        .query(params![id])
        .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))?;

    match rows
        .next()
        .map_err(|e| PortalError::Database(format!("Row fetch failed: {}", e)))?
    {
        Some(row) => Ok(Some(MemberRow::from_row(row).map_err(|e| {
            PortalError::Database(format!("Row parse failed: {}", e))
        })?)),
        None => Ok(None),
    }
}

/// Get household by ID, members included
pub fn get_household(conn: &Connection, id: i64) -> Result<Option<HouseholdRow>, PortalError> {
    let mut stmt = conn
        .prepare("SELECT * FROM households WHERE id = ?")
        .map_err(|e| PortalError::Database(format!("Prepare failed: {}", e)))?;

    let mut rows = stmt
        .query(params![id])
        .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))?;

    let mut household = match rows
        .next()
        .map_err(|e| PortalError::Database(format!("Row fetch failed: {}", e)))?
    {
        Some(row) => HouseholdRow::from_row(row)
            .map_err(|e| PortalError::Database(format!("Row parse failed: {}", e)))?,
        None => return Ok(None),
    };

    household.members = get_members(conn, id)?;

    Ok(Some(household))
}

/// List households, newest first, members included
pub fn list_households(
    conn: &Connection,
    query: &HouseholdQuery,
) -> Result<Vec<HouseholdRow>, PortalError> {
    let mut sql = String::from("SELECT * FROM households");
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![];

    if let Some(status) = query.status {
        sql.push_str(" WHERE status = ?");
        params.push(Box::new(status));
    }

    sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?");
    params.push(Box::new(query.limit as i64));
    params.push(Box::new(query.offset as i64));

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| PortalError::Database(format!("Prepare failed: {}", e)))?;

    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

    let rows = stmt
        .query_map(param_refs.as_slice(), HouseholdRow::from_row)
        .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))?;

    let mut households = rows
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| PortalError::Database(format!("Row parse failed: {}", e)))?;

    for household in &mut households {
        household.members = get_members(conn, household.id)?;
    }

    Ok(households)
}

/// Create a household with its members, snapshotting everything, in one
/// transaction
pub fn create_household(
    conn: &mut Connection,
    input: CreateHouseholdInput,
) -> Result<HouseholdRow, PortalError> {
    input.validate()?;

    let tx = conn
        .transaction()
        .map_err(|e| PortalError::Database(format!("Transaction failed: {}", e)))?;

    tx.execute(
        r#"
        INSERT INTO households (
            head_last_name, head_first_name, head_middle_name, purok,
            address, contact_number
        ) VALUES (?, ?, ?, ?, ?, ?)
        "#,
        params![
            input.head_last_name,
            input.head_first_name,
            input.head_middle_name,
            input.purok,
            input.address,
            input.contact_number,
        ],
    )
    .map_err(|e| PortalError::Database(format!("Insert failed: {}", e)))?;

    let household_id = tx.last_insert_rowid();

    for member in &input.members {
        tx.execute(
            r#"
            INSERT INTO household_members (
                household_id, last_name, first_name, middle_name, birthdate,
                sex, civil_status, relationship
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                household_id,
                member.last_name,
                member.first_name,
                member.middle_name,
                member.birthdate,
                member.sex,
                member.civil_status,
                member.relationship,
            ],
        )
        .map_err(|e| PortalError::Database(format!("Member insert failed: {}", e)))?;
    }

    let household = get_household(&tx, household_id)?
        .ok_or_else(|| PortalError::Internal("Household not found after insert".to_string()))?;

    snapshot_household(&tx, &household, BackupType::Create, Some(&household.created_at))?;
    for member in &household.members {
        snapshot_member(&tx, member, BackupType::Create, Some(&member.created_at))?;
    }

    tx.commit()
        .map_err(|e| PortalError::Database(format!("Commit failed: {}", e)))?;

    Ok(household)
}

/// Update a household (head/contact/status fields; members are managed
/// through the member operations)
pub fn update_household(
    conn: &mut Connection,
    id: i64,
    input: UpdateHouseholdInput,
) -> Result<HouseholdRow, PortalError> {
    let tx = conn
        .transaction()
        .map_err(|e| PortalError::Database(format!("Transaction failed: {}", e)))?;

    let current = get_household(&tx, id)?
        .ok_or_else(|| PortalError::NotFound(format!("household {id}")))?;

    let updated = HouseholdRow {
        id: current.id,
        head_last_name: input.head_last_name.unwrap_or(current.head_last_name),
        head_first_name: input.head_first_name.unwrap_or(current.head_first_name),
        head_middle_name: input.head_middle_name.or(current.head_middle_name),
        purok: input.purok.unwrap_or(current.purok),
        address: input.address.unwrap_or(current.address),
        contact_number: input.contact_number.or(current.contact_number),
        status: input.status.unwrap_or(current.status),
        created_at: current.created_at,
        members: current.members,
    };

    tx.execute(
        r#"
        UPDATE households SET
            head_last_name = ?, head_first_name = ?, head_middle_name = ?,
            purok = ?, address = ?, contact_number = ?, status = ?
        WHERE id = ?
        "#,
        params![
            updated.head_last_name,
            updated.head_first_name,
            updated.head_middle_name,
            updated.purok,
            updated.address,
            updated.contact_number,
            updated.status,
            id,
        ],
    )
    .map_err(|e| PortalError::Database(format!("Update failed: {}", e)))?;

    snapshot_household(&tx, &updated, BackupType::Update, None)?;

    tx.commit()
        .map_err(|e| PortalError::Database(format!("Commit failed: {}", e)))?;

    Ok(updated)
}

/// Delete a household and its members, shadowing all of them atomically
pub fn delete_household(conn: &mut Connection, id: i64) -> Result<(), PortalError> {
    let tx = conn
        .transaction()
        .map_err(|e| PortalError::Database(format!("Transaction failed: {}", e)))?;

    let household = get_household(&tx, id)?
        .ok_or_else(|| PortalError::NotFound(format!("household {id}")))?;

    snapshot_household(&tx, &household, BackupType::Delete, Some(&household.created_at))?;
    for member in &household.members {
        snapshot_member(&tx, member, BackupType::Delete, Some(&member.created_at))?;
    }

    tx.execute(
        "DELETE FROM household_members WHERE household_id = ?",
        params![id],
    )
    .map_err(|e| PortalError::Database(format!("Member delete failed: {}", e)))?;

    tx.execute("DELETE FROM households WHERE id = ?", params![id])
        .map_err(|e| PortalError::Database(format!("Delete failed: {}", e)))?;

    tx.commit()
        .map_err(|e| PortalError::Database(format!("Commit failed: {}", e)))?;

    Ok(())
}

/// Add a member to a live household
pub fn add_member(
    conn: &mut Connection,
    household_id: i64,
    input: CreateMemberInput,
) -> Result<MemberRow, PortalError> {
    input.validate()?;

    let tx = conn
        .transaction()
        .map_err(|e| PortalError::Database(format!("Transaction failed: {}", e)))?;

    let exists: bool = tx
        .query_row(
            "SELECT 1 FROM households WHERE id = ?",
            params![household_id],
            |_| Ok(true),
        )
        .unwrap_or(false);
    if !exists {
        return Err(PortalError::NotFound(format!("household {household_id}")));
    }

    tx.execute(
        r#"
        INSERT INTO household_members (
            household_id, last_name, first_name, middle_name, birthdate,
            sex, civil_status, relationship
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            household_id,
            input.last_name,
            input.first_name,
            input.middle_name,
            input.birthdate,
            input.sex,
            input.civil_status,
            input.relationship,
        ],
    )
    .map_err(|e| PortalError::Database(format!("Insert failed: {}", e)))?;

    let id = tx.last_insert_rowid();
    let member = get_member(&tx, id)?
        .ok_or_else(|| PortalError::Internal("Member not found after insert".to_string()))?;

    snapshot_member(&tx, &member, BackupType::Create, Some(&member.created_at))?;

    tx.commit()
        .map_err(|e| PortalError::Database(format!("Commit failed: {}", e)))?;

    Ok(member)
}

/// Update a member; each call writes a fresh update-type snapshot
pub fn update_member(
    conn: &mut Connection,
    id: i64,
    input: UpdateMemberInput,
) -> Result<MemberRow, PortalError> {
    let tx = conn
        .transaction()
        .map_err(|e| PortalError::Database(format!("Transaction failed: {}", e)))?;

    let current =
        get_member(&tx, id)?.ok_or_else(|| PortalError::NotFound(format!("member {id}")))?;

    let updated = MemberRow {
        id: current.id,
        household_id: current.household_id,
        last_name: input.last_name.unwrap_or(current.last_name),
        first_name: input.first_name.unwrap_or(current.first_name),
        middle_name: input.middle_name.or(current.middle_name),
        birthdate: input.birthdate.or(current.birthdate),
        sex: input.sex.or(current.sex),
        civil_status: input.civil_status.or(current.civil_status),
        relationship: input.relationship.unwrap_or(current.relationship),
        created_at: current.created_at,
    };

    tx.execute(
        r#"
        UPDATE household_members SET
            last_name = ?, first_name = ?, middle_name = ?, birthdate = ?,
            sex = ?, civil_status = ?, relationship = ?
        WHERE id = ?
        "#,
        params![
            updated.last_name,
            updated.first_name,
            updated.middle_name,
            updated.birthdate,
            updated.sex,
            updated.civil_status,
            updated.relationship,
            id,
        ],
    )
    .map_err(|e| PortalError::Database(format!("Update failed: {}", e)))?;

    snapshot_member(&tx, &updated, BackupType::Update, None)?;

    tx.commit()
        .map_err(|e| PortalError::Database(format!("Commit failed: {}", e)))?;

    Ok(updated)
}

/// Delete a member, capturing its pre-delete state
pub fn delete_member(conn: &mut Connection, id: i64) -> Result<(), PortalError> {
    let tx = conn
        .transaction()
        .map_err(|e| PortalError::Database(format!("Transaction failed: {}", e)))?;

    let member =
        get_member(&tx, id)?.ok_or_else(|| PortalError::NotFound(format!("member {id}")))?;

    snapshot_member(&tx, &member, BackupType::Delete, Some(&member.created_at))?;

    tx.execute("DELETE FROM household_members WHERE id = ?", params![id])
        .map_err(|e| PortalError::Database(format!("Delete failed: {}", e)))?;

    tx.commit()
        .map_err(|e| PortalError::Database(format!("Commit failed: {}", e)))?;

    Ok(())
}

/// List all household snapshots, newest first
pub fn list_household_backups(conn: &Connection) -> Result<Vec<HouseholdBackupRow>, PortalError> {
    let mut stmt = conn
        .prepare("SELECT * FROM backup_households ORDER BY created_at DESC, id DESC")
        .map_err(|e| PortalError::Database(format!("Prepare failed: {}", e)))?;

    let rows = stmt
        .query_map([], HouseholdBackupRow::from_row)
        .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| PortalError::Database(format!("Row parse failed: {}", e)))
}

/// List all member snapshots, newest first
pub fn list_member_backups(conn: &Connection) -> Result<Vec<MemberBackupRow>, PortalError> {
    let mut stmt = conn
        .prepare("SELECT * FROM backup_household_members ORDER BY created_at DESC, id DESC")
        .map_err(|e| PortalError::Database(format!("Prepare failed: {}", e)))?;

    let rows = stmt
        .query_map([], MemberBackupRow::from_row)
        .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| PortalError::Database(format!("Row parse failed: {}", e)))
}

/// Restore household snapshots; member snapshots captured with a deleted
/// household are re-homed under the new household id and consumed
pub fn restore_households(
    conn: &mut Connection,
    ids: &[i64],
    policy: &RestorePolicy,
) -> RestoreReport {
    backup::restore_batch(ids, |backup_id| restore_one_household(conn, backup_id, policy))
}

fn restore_one_household(
    conn: &mut Connection,
    backup_id: i64,
    policy: &RestorePolicy,
) -> Result<i64, PortalError> {
    let tx = conn
        .transaction()
        .map_err(|e| PortalError::Database(format!("Transaction failed: {}", e)))?;

    let shadow = {
        let mut stmt = tx
            .prepare("SELECT * FROM backup_households WHERE id = ?")
            .map_err(|e| PortalError::Database(format!("Prepare failed: {}", e)))?;
        let mut rows = stmt
            .query(params![backup_id])
            .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))?;
        match rows
            .next()
            .map_err(|e| PortalError::Database(format!("Row fetch failed: {}", e)))?
        {
            Some(row) => HouseholdBackupRow::from_row(row)
                .map_err(|e| PortalError::Database(format!("Row parse failed: {}", e)))?,
            None => {
                return Err(PortalError::NotFound(format!(
                    "backup household {backup_id}"
                )))
            }
        }
    };

    let status = match policy.reset_status_to {
        Some(s) => HouseholdStatus::parse(s)?,
        None => shadow.status,
    };

    if policy.preserve_created_at {
        tx.execute(
            r#"
            INSERT INTO households (
                head_last_name, head_first_name, head_middle_name, purok,
                address, contact_number, status, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                shadow.head_last_name,
                shadow.head_first_name,
                shadow.head_middle_name,
                shadow.purok,
                shadow.address,
                shadow.contact_number,
                status,
                shadow.created_at,
            ],
        )
    } else {
        tx.execute(
            r#"
            INSERT INTO households (
                head_last_name, head_first_name, head_middle_name, purok,
                address, contact_number, status
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                shadow.head_last_name,
                shadow.head_first_name,
                shadow.head_middle_name,
                shadow.purok,
                shadow.address,
                shadow.contact_number,
                status,
            ],
        )
    }
    .map_err(|e| PortalError::Database(format!("Restore insert failed: {}", e)))?;

    let new_id = tx.last_insert_rowid();

    // Re-home the member snapshots captured when this household was deleted
    let member_shadows = {
        let mut stmt = tx
            .prepare(
                "SELECT * FROM backup_household_members
                 WHERE household_id = ? AND backup_type = 'delete' ORDER BY id",
            )
            .map_err(|e| PortalError::Database(format!("Prepare failed: {}", e)))?;
        let rows = stmt
            .query_map(params![shadow.original_id], MemberBackupRow::from_row)
            .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| PortalError::Database(format!("Row parse failed: {}", e)))?
    };

    for member in &member_shadows {
        tx.execute(
            r#"
            INSERT INTO household_members (
                household_id, last_name, first_name, middle_name, birthdate,
                sex, civil_status, relationship, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                new_id,
                member.last_name,
                member.first_name,
                member.middle_name,
                member.birthdate,
                member.sex,
                member.civil_status,
                member.relationship,
                member.created_at,
            ],
        )
        .map_err(|e| PortalError::Database(format!("Member restore failed: {}", e)))?;

        tx.execute(
            "DELETE FROM backup_household_members WHERE id = ?",
            params![member.id],
        )
        .map_err(|e| PortalError::Database(format!("Snapshot consume failed: {}", e)))?;
    }

    tx.execute(
        "DELETE FROM backup_households WHERE id = ?",
        params![backup_id],
    )
    .map_err(|e| PortalError::Database(format!("Snapshot consume failed: {}", e)))?;

    tx.commit()
        .map_err(|e| PortalError::Database(format!("Commit failed: {}", e)))?;

    Ok(new_id)
}

/// Restore individual member snapshots into their live household
pub fn restore_members(
    conn: &mut Connection,
    ids: &[i64],
    policy: &RestorePolicy,
) -> RestoreReport {
    backup::restore_batch(ids, |backup_id| restore_one_member(conn, backup_id, policy))
}

fn restore_one_member(
    conn: &mut Connection,
    backup_id: i64,
    policy: &RestorePolicy,
) -> Result<i64, PortalError> {
    let tx = conn
        .transaction()
        .map_err(|e| PortalError::Database(format!("Transaction failed: {}", e)))?;

    let shadow = {
        let mut stmt = tx
            .prepare("SELECT * FROM backup_household_members WHERE id = ?")
            .map_err(|e| PortalError::Database(format!("Prepare failed: {}", e)))?;
        let mut rows = stmt
            .query(params![backup_id])
            .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))?;
        match rows
            .next()
            .map_err(|e| PortalError::Database(format!("Row fetch failed: {}", e)))?
        {
            Some(row) => MemberBackupRow::from_row(row)
                .map_err(|e| PortalError::Database(format!("Row parse failed: {}", e)))?,
            None => return Err(PortalError::NotFound(format!("backup member {backup_id}"))),
        }
    };

    let household_live: bool = tx
        .query_row(
            "SELECT 1 FROM households WHERE id = ?",
            params![shadow.household_id],
            |_| Ok(true),
        )
        .unwrap_or(false);
    if !household_live {
        return Err(PortalError::Validation(format!(
            "household {} is not live; restore the household first",
            shadow.household_id
        )));
    }

    if policy.preserve_created_at {
        tx.execute(
            r#"
            INSERT INTO household_members (
                household_id, last_name, first_name, middle_name, birthdate,
                sex, civil_status, relationship, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                shadow.household_id,
                shadow.last_name,
                shadow.first_name,
                shadow.middle_name,
                shadow.birthdate,
                shadow.sex,
                shadow.civil_status,
                shadow.relationship,
                shadow.created_at,
            ],
        )
    } else {
        tx.execute(
            r#"
            INSERT INTO household_members (
                household_id, last_name, first_name, middle_name, birthdate,
                sex, civil_status, relationship
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                shadow.household_id,
                shadow.last_name,
                shadow.first_name,
                shadow.middle_name,
                shadow.birthdate,
                shadow.sex,
                shadow.civil_status,
                shadow.relationship,
            ],
        )
    }
    .map_err(|e| PortalError::Database(format!("Restore insert failed: {}", e)))?;

    let new_id = tx.last_insert_rowid();

    tx.execute(
        "DELETE FROM backup_household_members WHERE id = ?",
        params![backup_id],
    )
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

    fn sample_input() -> CreateHouseholdInput {
        CreateHouseholdInput {
            head_last_name: "Reyes".to_string(),
            head_first_name: "Mario".to_string(),
            head_middle_name: None,
            purok: "Purok 5".to_string(),
            address: "Rizal St.".to_string(),
            contact_number: Some("09181234567".to_string()),
            members: vec![
                CreateMemberInput {
                    last_name: "Reyes".to_string(),
                    first_name: "Lea".to_string(),
                    middle_name: None,
                    birthdate: Some("1990-04-01".to_string()),
                    sex: Some("F".to_string()),
                    civil_status: Some("married".to_string()),
                    relationship: "spouse".to_string(),
                },
                CreateMemberInput {
                    last_name: "Reyes".to_string(),
                    first_name: "Niko".to_string(),
                    middle_name: None,
                    birthdate: Some("2015-08-20".to_string()),
                    sex: Some("M".to_string()),
                    civil_status: Some("single".to_string()),
                    relationship: "son".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_create_snapshots_household_and_members() {
        let mut conn = test_conn();
        let household = create_household(&mut conn, sample_input()).unwrap();

        assert_eq!(household.status, HouseholdStatus::Pending);
        assert_eq!(household.members.len(), 2);

        assert_eq!(list_household_backups(&conn).unwrap().len(), 1);
        assert_eq!(list_member_backups(&conn).unwrap().len(), 2);
    }

    #[test]
    fn test_delete_shadows_members_atomically() {
        let mut conn = test_conn();
        let household = create_household(&mut conn, sample_input()).unwrap();

        delete_household(&mut conn, household.id).unwrap();

        assert!(get_household(&conn, household.id).unwrap().is_none());
        assert!(get_members(&conn, household.id).unwrap().is_empty());

        let member_deletes: Vec<_> = list_member_backups(&conn)
            .unwrap()
            .into_iter()
            .filter(|b| b.backup_type == BackupType::Delete)
            .collect();
        assert_eq!(member_deletes.len(), 2);
        assert!(member_deletes
            .iter()
            .all(|b| b.household_id == household.id));
    }

    #[test]
    fn test_restore_rehomes_members() {
        let mut conn = test_conn();
        let household = create_household(&mut conn, sample_input()).unwrap();
        delete_household(&mut conn, household.id).unwrap();

        let shadow_id = list_household_backups(&conn)
            .unwrap()
            .into_iter()
            .find(|b| b.backup_type == BackupType::Delete)
            .unwrap()
            .id;

        let report = restore_households(&mut conn, &[shadow_id], &default_restore_policy(true));
        assert_eq!(report.success_count(), 1);

        let restored = get_household(&conn, report.restored[0]).unwrap().unwrap();
        assert_eq!(restored.status, HouseholdStatus::Pending);
        assert_eq!(restored.members.len(), 2);
        assert!(restored.members.iter().all(|m| m.household_id == restored.id));

        // delete-type member snapshots were consumed; create-type history remains
        let remaining = list_member_backups(&conn).unwrap();
        assert!(remaining.iter().all(|b| b.backup_type == BackupType::Create));
    }

    #[test]
    fn test_restore_member_requires_live_household() {
        let mut conn = test_conn();
        let household = create_household(&mut conn, sample_input()).unwrap();
        let member_id = household.members[0].id;

        delete_member(&mut conn, member_id).unwrap();
        let shadow_id = list_member_backups(&conn)
            .unwrap()
            .into_iter()
            .find(|b| b.backup_type == BackupType::Delete)
            .unwrap()
            .id;

        // works while the household is live
        let report = restore_members(&mut conn, &[shadow_id], &RestorePolicy::preserve());
        assert_eq!(report.success_count(), 1);

        // delete the member again, then the whole household; a lone member
        // restore must now fail
        let member_id = report.restored[0];
        delete_member(&mut conn, member_id).unwrap();
        let shadow_id = list_member_backups(&conn)
            .unwrap()
            .into_iter()
            .filter(|b| b.backup_type == BackupType::Delete)
            .map(|b| b.id)
            .max()
            .unwrap();
        delete_household(&mut conn, household.id).unwrap();

        let report = restore_members(&mut conn, &[shadow_id], &RestorePolicy::preserve());
        assert_eq!(report.success_count(), 0);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].reason.contains("not live"));
    }
}
