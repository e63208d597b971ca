//! Event CRUD with shadow snapshots
//!
//! Events carry an optional image reference into the asset store. The record
//! delete returns the deleted row so the caller can fire off asset cleanup;
//! asset deletion is never part of the transaction.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::backup::{self, BackupType, RestorePolicy, RestoreReport};
use crate::error::PortalError;

/// Event row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub event_date: String,
    pub image_path: Option<String>,
    pub created_at: String,
}

impl EventRow {
    pub(crate) fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            location: row.get("location")?,
            event_date: row.get("event_date")?,
            image_path: row.get("image_path")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Snapshot row from `backup_events`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBackupRow {
    pub id: i64,
    pub original_id: i64,
    pub backup_type: BackupType,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub event_date: String,
    pub image_path: Option<String>,
    pub created_at: String,
}

impl EventBackupRow {
    pub(crate) fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            original_id: row.get("original_id")?,
            backup_type: row.get("backup_type")?,
            title: row.get("title")?,
            description: row.get("description")?,
            location: row.get("location")?,
            event_date: row.get("event_date")?,
            image_path: row.get("image_path")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Input for creating an event
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub event_date: String,
    #[serde(default)]
    pub image_path: Option<String>,
}

impl CreateEventInput {
    pub fn validate(&self) -> Result<(), PortalError> {
        if self.title.trim().is_empty() {
            return Err(PortalError::Validation("title is required".to_string()));
        }
        if self.event_date.trim().is_empty() {
            return Err(PortalError::Validation("event_date is required".to_string()));
        }
        Ok(())
    }
}

/// Input for updating an event; absent fields keep their current value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateEventInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub event_date: Option<String>,
    #[serde(default)]
    pub image_path: Option<String>,
}

/// Query parameters for listing events
#[derive(Debug, Clone, Deserialize)]
pub struct EventQuery {
    /// Only events on or after this date
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl Default for EventQuery {
    fn default() -> Self {
        Self {
            from: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

fn default_limit() -> u32 {
    100
}

fn snapshot_event(
    conn: &Connection,
    row: &EventRow,
    backup_type: BackupType,
    created_at: Option<&str>,
) -> Result<(), PortalError> {
    let result = match created_at {
        Some(ts) => conn.execute(
            r#"
            INSERT INTO backup_events (
                original_id, backup_type, title, description, location,
                event_date, image_path, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                row.id,
                backup_type,
                row.title,
                row.description,
                row.location,
                row.event_date,
                row.image_path,
                ts,
            ],
        ),
        None => conn.execute(
            r#"
            INSERT INTO backup_events (
                original_id, backup_type, title, description, location,
                event_date, image_path
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                row.id,
                backup_type,
                row.title,
                row.description,
                row.location,
                row.event_date,
                row.image_path,
            ],
        ),
    };

    result.map_err(|e| PortalError::BackupWrite(format!("event snapshot failed: {}", e)))?;
    Ok(())
}

/// Get event by ID
pub fn get_event(conn: &Connection, id: i64) -> Result<Option<EventRow>, PortalError> {
    let mut stmt = conn
        .prepare("SELECT * FROM events WHERE id = ?")
        .map_err(|e| PortalError::Database(format!("Prepare failed: {}", e)))?;

    let mut rows = stmt
        .query(params![id])
        .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))?;

    match rows
        .next()
        .map_err(|e| PortalError::Database(format!("Row fetch failed: {}", e)))?
    {
        Some(row) => Ok(Some(EventRow::from_row(row).map_err(|e| {
            PortalError::Database(format!("Row parse failed: {}", e))
        })?)),
        None => Ok(None),
    }
}

/// List events, soonest first
pub fn list_events(conn: &Connection, query: &EventQuery) -> Result<Vec<EventRow>, PortalError> {
    let mut sql = String::from("SELECT * FROM events");
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![];

    if let Some(ref from) = query.from {
        sql.push_str(" WHERE event_date >= ?");
        params.push(Box::new(from.clone()));
    }

    sql.push_str(" ORDER BY event_date DESC, id DESC LIMIT ? OFFSET ?");
    params.push(Box::new(query.limit as i64));
    params.push(Box::new(query.offset as i64));

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| PortalError::Database(format!("Prepare failed: {}", e)))?;

    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

    let rows = stmt
        .query_map(param_refs.as_slice(), EventRow::from_row)
        .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| PortalError::Database(format!("Row parse failed: {}", e)))
}

/// Create an event and its create-type snapshot in one transaction
pub fn create_event(conn: &mut Connection, input: CreateEventInput) -> Result<EventRow, PortalError> {
    input.validate()?;

    let tx = conn
        .transaction()
        .map_err(|e| PortalError::Database(format!("Transaction failed: {}", e)))?;

    tx.execute(
        r#"
        INSERT INTO events (title, description, location, event_date, image_path)
        VALUES (?, ?, ?, ?, ?)
        "#,
        params![
            input.title,
            input.description,
            input.location,
            input.event_date,
            input.image_path,
        ],
    )
    .map_err(|e| PortalError::Database(format!("Insert failed: {}", e)))?;

    let id = tx.last_insert_rowid();
    let row = get_event(&tx, id)?
        .ok_or_else(|| PortalError::Internal("Event not found after insert".to_string()))?;

    snapshot_event(&tx, &row, BackupType::Create, Some(&row.created_at))?;

    tx.commit()
        .map_err(|e| PortalError::Database(format!("Commit failed: {}", e)))?;

    Ok(row)
}

/// Update an event; each call writes a fresh update-type snapshot
pub fn update_event(
    conn: &mut Connection,
    id: i64,
    input: UpdateEventInput,
) -> Result<EventRow, PortalError> {
    let tx = conn
        .transaction()
        .map_err(|e| PortalError::Database(format!("Transaction failed: {}", e)))?;

    let current =
        get_event(&tx, id)?.ok_or_else(|| PortalError::NotFound(format!("event {id}")))?;

    let updated = EventRow {
        id: current.id,
        title: input.title.unwrap_or(current.title),
        description: input.description.or(current.description),
        location: input.location.or(current.location),
        event_date: input.event_date.unwrap_or(current.event_date),
        image_path: input.image_path.or(current.image_path),
        created_at: current.created_at,
    };

    tx.execute(
        r#"
        UPDATE events SET title = ?, description = ?, location = ?,
            event_date = ?, image_path = ?
        WHERE id = ?
        "#,
        params![
            updated.title,
            updated.description,
            updated.location,
            updated.event_date,
            updated.image_path,
            id,
        ],
    )
    .map_err(|e| PortalError::Database(format!("Update failed: {}", e)))?;

    snapshot_event(&tx, &updated, BackupType::Update, None)?;

    tx.commit()
        .map_err(|e| PortalError::Database(format!("Commit failed: {}", e)))?;

    Ok(updated)
}

/// Delete an event, returning the deleted row so the caller can clean up
/// its image asset
pub fn delete_event(conn: &mut Connection, id: i64) -> Result<EventRow, PortalError> {
    let tx = conn
        .transaction()
        .map_err(|e| PortalError::Database(format!("Transaction failed: {}", e)))?;

    let row =
        get_event(&tx, id)?.ok_or_else(|| PortalError::NotFound(format!("event {id}")))?;

    snapshot_event(&tx, &row, BackupType::Delete, Some(&row.created_at))?;

    tx.execute("DELETE FROM events WHERE id = ?", params![id])
        .map_err(|e| PortalError::Database(format!("Delete failed: {}", e)))?;

    tx.commit()
        .map_err(|e| PortalError::Database(format!("Commit failed: {}", e)))?;

    Ok(row)
}

/// List all event snapshots, newest first
pub fn list_event_backups(conn: &Connection) -> Result<Vec<EventBackupRow>, PortalError> {
    let mut stmt = conn
        .prepare("SELECT * FROM backup_events ORDER BY created_at DESC, id DESC")
        .map_err(|e| PortalError::Database(format!("Prepare failed: {}", e)))?;

    let rows = stmt
        .query_map([], EventBackupRow::from_row)
        .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| PortalError::Database(format!("Row parse failed: {}", e)))
}

/// Restore a set of event snapshots, one item at a time
pub fn restore_events(
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
            .prepare("SELECT * FROM backup_events WHERE id = ?")
            .map_err(|e| PortalError::Database(format!("Prepare failed: {}", e)))?;
        let mut rows = stmt
            .query(params![backup_id])
            .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))?;
        match rows
            .next()
            .map_err(|e| PortalError::Database(format!("Row fetch failed: {}", e)))?
        {
            Some(row) => EventBackupRow::from_row(row)
                .map_err(|e| PortalError::Database(format!("Row parse failed: {}", e)))?,
            None => return Err(PortalError::NotFound(format!("backup event {backup_id}"))),
        }
    };

    if policy.preserve_created_at {
        tx.execute(
            r#"
            INSERT INTO events (title, description, location, event_date, image_path, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                shadow.title,
                shadow.description,
                shadow.location,
                shadow.event_date,
                shadow.image_path,
                shadow.created_at,
            ],
        )
    } else {
        tx.execute(
            r#"
            INSERT INTO events (title, description, location, event_date, image_path)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                shadow.title,
                shadow.description,
                shadow.location,
                shadow.event_date,
                shadow.image_path,
            ],
        )
    }
    .map_err(|e| PortalError::Database(format!("Restore insert failed: {}", e)))?;

    let new_id = tx.last_insert_rowid();

    tx.execute("DELETE FROM backup_events WHERE id = ?", params![backup_id])
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

    fn sample_input() -> CreateEventInput {
        CreateEventInput {
            title: "Coastal Cleanup".to_string(),
            description: Some("Bring gloves".to_string()),
            location: Some("Seaside Park".to_string()),
            event_date: "2026-09-12".to_string(),
            image_path: Some("uploads/cleanup.jpg".to_string()),
        }
    }

    #[test]
    fn test_lifecycle_snapshots() {
        let mut conn = test_conn();
        let row = create_event(&mut conn, sample_input()).unwrap();

        update_event(
            &mut conn,
            row.id,
            UpdateEventInput {
                location: Some("Main Plaza".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let deleted = delete_event(&mut conn, row.id).unwrap();
        assert_eq!(deleted.image_path.as_deref(), Some("uploads/cleanup.jpg"));

        let backups = list_event_backups(&conn).unwrap();
        let types: Vec<BackupType> = backups.iter().map(|b| b.backup_type).collect();
        assert!(types.contains(&BackupType::Create));
        assert!(types.contains(&BackupType::Update));
        assert!(types.contains(&BackupType::Delete));
    }

    #[test]
    fn test_restore_preserves_fields() {
        let mut conn = test_conn();
        let row = create_event(&mut conn, sample_input()).unwrap();
        delete_event(&mut conn, row.id).unwrap();

        let shadow_id = list_event_backups(&conn)
            .unwrap()
            .into_iter()
            .find(|b| b.backup_type == BackupType::Delete)
            .unwrap()
            .id;

        let report = restore_events(&mut conn, &[shadow_id], &RestorePolicy::preserve());
        assert_eq!(report.success_count(), 1);

        let restored = get_event(&conn, report.restored[0]).unwrap().unwrap();
        assert_eq!(restored.title, "Coastal Cleanup");
        assert_eq!(restored.created_at, row.created_at);
        assert_ne!(restored.id, row.id);
    }

    #[test]
    fn test_list_events_from_filter() {
        let mut conn = test_conn();
        let mut input = sample_input();
        input.event_date = "2026-01-01".to_string();
        create_event(&mut conn, input).unwrap();
        create_event(&mut conn, sample_input()).unwrap();

        let upcoming = list_events(
            &conn,
            &EventQuery {
                from: Some("2026-06-01".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].event_date, "2026-09-12");
    }
}
