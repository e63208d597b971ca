//! SQLite database module for portal records
//!
//! ## Architecture
//!
//! - Live tables hold current, queryable records
//! - `backup_*` mirrors hold immutable snapshots written in the same
//!   transaction as every create/update/delete
//! - Restore consumes a snapshot and re-inserts it as a live row
//!
//! ## Tables
//!
//! - `requests` / `backup_requests` - certificate requests
//! - `events` / `backup_events` - barangay events
//! - `households` / `backup_households` - RBI registrations
//! - `household_members` / `backup_household_members` - RBI members
//! - `admins`, `password_resets` - staff accounts and reset codes

pub mod admins;
pub mod events;
pub mod households;
pub mod password_resets;
pub mod requests;
pub mod schema;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::PortalError;

/// SQLite database for portal records
pub struct PortalDb {
    conn: Mutex<Connection>,
}

impl PortalDb {
    /// Open or create the portal database
    pub fn open(storage_dir: &Path) -> Result<Self, PortalError> {
        let db_path = storage_dir.join("portal.db");
        info!("Opening SQLite database at {:?}", db_path);

        let conn = Connection::open(&db_path)
            .map_err(|e| PortalError::Database(format!("Failed to open SQLite: {}", e)))?;

        // WAL for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| PortalError::Database(format!("Failed to set PRAGMA: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };

        db.init_schema()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, PortalError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory()
            .map_err(|e| PortalError::Database(format!("Failed to open in-memory SQLite: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };

        db.init_schema()?;

        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<(), PortalError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| PortalError::Internal(format!("Lock poisoned: {}", e)))?;

        schema::init_schema(&conn)?;

        Ok(())
    }

    /// Run a read operation against the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, PortalError>
    where
        F: FnOnce(&Connection) -> Result<T, PortalError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| PortalError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Run a write operation with exclusive access (required for transactions)
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T, PortalError>
    where
        F: FnOnce(&mut Connection) -> Result<T, PortalError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| PortalError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&mut conn)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats, PortalError> {
        self.with_conn(|conn| {
            let count = |table: &str| -> Result<u64, PortalError> {
                let n: i64 = conn
                    .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                        row.get(0)
                    })
                    .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))?;
                Ok(n as u64)
            };

            Ok(DbStats {
                requests: count("requests")?,
                events: count("events")?,
                households: count("households")?,
                members: count("household_members")?,
                shadow_rows: count("backup_requests")?
                    + count("backup_events")?
                    + count("backup_households")?
                    + count("backup_household_members")?,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub requests: u64,
    pub events: u64,
    pub households: u64,
    pub members: u64,
    pub shadow_rows: u64,
}

// Re-exports
pub use admins::AdminRow;
pub use events::{CreateEventInput, EventBackupRow, EventQuery, EventRow, UpdateEventInput};
pub use households::{
    CreateHouseholdInput, CreateMemberInput, HouseholdBackupRow, HouseholdQuery, HouseholdRow,
    HouseholdStatus, MemberBackupRow, MemberRow, UpdateHouseholdInput, UpdateMemberInput,
};
pub use requests::{
    CertificateType, CreateRequestInput, RequestBackupRow, RequestQuery, RequestRow,
    RequestStatus, UpdateRequestInput,
};
