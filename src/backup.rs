//! Shadow-store vocabulary shared by every backed-up entity kind
//!
//! Each reviewable record (request, event, household, member) has a live
//! table and a `backup_*` mirror. Every create/update/delete writes a
//! snapshot row into the mirror inside the same transaction as the primary
//! mutation, so no mutation is visible without its shadow. Restore moves a
//! chosen shadow row back into the live table and consumes it.

use serde::{Deserialize, Serialize};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

use crate::error::PortalError;

/// Which mutation produced a shadow row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupType {
    Create,
    Update,
    Delete,
}

impl BackupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupType::Create => "create",
            BackupType::Update => "update",
            BackupType::Delete => "delete",
        }
    }

    pub fn parse(s: &str) -> Result<Self, PortalError> {
        match s {
            "create" => Ok(BackupType::Create),
            "update" => Ok(BackupType::Update),
            "delete" => Ok(BackupType::Delete),
            other => Err(PortalError::Validation(format!(
                "unknown backup type: {other}"
            ))),
        }
    }
}

impl FromSql for BackupType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        BackupType::parse(s).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for BackupType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

/// Per-entity-kind restore behavior
///
/// The source of record for each kind decides whether a restored row keeps
/// the snapshot's timestamp and whether its status is forced back to the
/// review default instead of whatever was captured.
#[derive(Debug, Clone, Copy)]
pub struct RestorePolicy {
    pub preserve_created_at: bool,
    pub reset_status_to: Option<&'static str>,
}

impl RestorePolicy {
    /// Restore the snapshot exactly as captured.
    pub fn preserve() -> Self {
        Self {
            preserve_created_at: true,
            reset_status_to: None,
        }
    }

    /// Restore the snapshot but force its status back to `status`.
    pub fn reset_to(status: &'static str) -> Self {
        Self {
            preserve_created_at: true,
            reset_status_to: Some(status),
        }
    }
}

/// One shadow row that could not be restored
#[derive(Debug, Clone, Serialize)]
pub struct RestoreFailure {
    /// Shadow row id, not the original record id
    pub id: i64,
    pub reason: String,
}

/// Outcome of a batch restore
#[derive(Debug, Clone, Default, Serialize)]
pub struct RestoreReport {
    /// Live ids assigned to the restored records, in input order
    pub restored: Vec<i64>,
    pub failures: Vec<RestoreFailure>,
}

impl RestoreReport {
    pub fn success_count(&self) -> usize {
        self.restored.len()
    }
}

/// Drive a batch restore one item at a time.
///
/// Each id is handed to `restore_one`, which restores a single shadow row in
/// its own transaction and returns the new live id. A failed item is recorded
/// and the rest of the batch continues; the batch is never all-or-nothing.
pub fn restore_batch<F>(ids: &[i64], mut restore_one: F) -> RestoreReport
where
    F: FnMut(i64) -> Result<i64, PortalError>,
{
    let mut report = RestoreReport::default();

    for &id in ids {
        match restore_one(id) {
            Ok(new_id) => report.restored.push(new_id),
            Err(e) => report.failures.push(RestoreFailure {
                id,
                reason: e.to_string(),
            }),
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backup_type_round_trip() {
        for ty in [BackupType::Create, BackupType::Update, BackupType::Delete] {
            assert_eq!(BackupType::parse(ty.as_str()).unwrap(), ty);
        }
        assert!(BackupType::parse("truncate").is_err());
    }

    #[test]
    fn test_restore_batch_partial_success() {
        let report = restore_batch(&[1, 2, 3], |id| {
            if id == 2 {
                Err(PortalError::NotFound(format!("backup row {id}")))
            } else {
                Ok(id + 100)
            }
        });

        assert_eq!(report.restored, vec![101, 103]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].id, 2);
        assert_eq!(report.success_count(), 2);
    }
}
