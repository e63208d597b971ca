//! Database schema definitions
//!
//! Every reviewable entity owns exactly two tables: the live table and its
//! `backup_*` mirror. Mirror columns are the live columns plus `original_id`
//! and `backup_type`; the mirror's own `id` and `created_at` are bookkeeping.

use rusqlite::Connection;
use tracing::info;

use crate::error::PortalError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), PortalError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!(
            "Migrating schema from v{} to v{}",
            current_version, SCHEMA_VERSION
        );
        migrate_schema(conn, current_version)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32, PortalError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )
    .map_err(|e| PortalError::Database(format!("Failed to create schema_version table: {}", e)))?;

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    Ok(version)
}

/// Set schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<(), PortalError> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| PortalError::Database(format!("Failed to clear schema_version: {}", e)))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])
        .map_err(|e| PortalError::Database(format!("Failed to set schema_version: {}", e)))?;
    Ok(())
}

/// Migrate schema from older version
fn migrate_schema(conn: &Connection, from_version: i32) -> Result<(), PortalError> {
    match from_version {
        // 1 -> 2 migration goes here when the schema evolves
        _ => {}
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

/// Create all tables
fn create_tables(conn: &Connection) -> Result<(), PortalError> {
    conn.execute_batch(REQUESTS_SCHEMA)
        .map_err(|e| PortalError::Database(format!("Failed to create request tables: {}", e)))?;

    conn.execute_batch(EVENTS_SCHEMA)
        .map_err(|e| PortalError::Database(format!("Failed to create event tables: {}", e)))?;

    conn.execute_batch(HOUSEHOLDS_SCHEMA)
        .map_err(|e| PortalError::Database(format!("Failed to create household tables: {}", e)))?;

    conn.execute_batch(ACCOUNTS_SCHEMA)
        .map_err(|e| PortalError::Database(format!("Failed to create account tables: {}", e)))?;

    conn.execute_batch(INDEXES_SCHEMA)
        .map_err(|e| PortalError::Database(format!("Failed to create indexes: {}", e)))?;

    Ok(())
}

/// Certificate request tables
const REQUESTS_SCHEMA: &str = r#"
-- Live certificate requests submitted by residents
CREATE TABLE IF NOT EXISTS requests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    last_name TEXT NOT NULL,
    first_name TEXT NOT NULL,
    middle_name TEXT,
    address TEXT NOT NULL,
    contact_number TEXT NOT NULL,
    email TEXT,
    certificate_type TEXT NOT NULL,
    purpose TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Point-in-time snapshots, one row per create/update/delete
CREATE TABLE IF NOT EXISTS backup_requests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    original_id INTEGER NOT NULL,
    backup_type TEXT NOT NULL,
    last_name TEXT NOT NULL,
    first_name TEXT NOT NULL,
    middle_name TEXT,
    address TEXT NOT NULL,
    contact_number TEXT NOT NULL,
    email TEXT,
    certificate_type TEXT NOT NULL,
    purpose TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Event tables
const EVENTS_SCHEMA: &str = r#"
-- Barangay events published to residents
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    description TEXT,
    location TEXT,
    event_date TEXT NOT NULL,
    image_path TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS backup_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    original_id INTEGER NOT NULL,
    backup_type TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    location TEXT,
    event_date TEXT NOT NULL,
    image_path TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// RBI household registry tables
const HOUSEHOLDS_SCHEMA: &str = r#"
-- Household registration (RBI) submissions
CREATE TABLE IF NOT EXISTS households (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    head_last_name TEXT NOT NULL,
    head_first_name TEXT NOT NULL,
    head_middle_name TEXT,
    purok TEXT NOT NULL,
    address TEXT NOT NULL,
    contact_number TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS backup_households (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    original_id INTEGER NOT NULL,
    backup_type TEXT NOT NULL,
    head_last_name TEXT NOT NULL,
    head_first_name TEXT NOT NULL,
    head_middle_name TEXT,
    purok TEXT NOT NULL,
    address TEXT NOT NULL,
    contact_number TEXT,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS household_members (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    household_id INTEGER NOT NULL,
    last_name TEXT NOT NULL,
    first_name TEXT NOT NULL,
    middle_name TEXT,
    birthdate TEXT,
    sex TEXT,
    civil_status TEXT,
    relationship TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (household_id) REFERENCES households(id)
);

-- household_id here is the ORIGINAL household id at capture time
CREATE TABLE IF NOT EXISTS backup_household_members (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    original_id INTEGER NOT NULL,
    backup_type TEXT NOT NULL,
    household_id INTEGER NOT NULL,
    last_name TEXT NOT NULL,
    first_name TEXT NOT NULL,
    middle_name TEXT,
    birthdate TEXT,
    sex TEXT,
    civil_status TEXT,
    relationship TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Admin accounts and password reset codes
const ACCOUNTS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS admins (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Single-use, time-boxed reset codes (survives restarts, unlike an
-- in-process map)
CREATE TABLE IF NOT EXISTS password_resets (
    email TEXT NOT NULL,
    code TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    PRIMARY KEY (email, code)
);
"#;

/// Index definitions for fast queries
const INDEXES_SCHEMA: &str = r#"
-- Live table indexes
CREATE INDEX IF NOT EXISTS idx_requests_status ON requests(status);
CREATE INDEX IF NOT EXISTS idx_requests_created_at ON requests(created_at);
CREATE INDEX IF NOT EXISTS idx_events_event_date ON events(event_date);
CREATE INDEX IF NOT EXISTS idx_households_status ON households(status);
CREATE INDEX IF NOT EXISTS idx_members_household_id ON household_members(household_id);

-- Shadow table indexes
CREATE INDEX IF NOT EXISTS idx_backup_requests_original ON backup_requests(original_id);
CREATE INDEX IF NOT EXISTS idx_backup_events_original ON backup_events(original_id);
CREATE INDEX IF NOT EXISTS idx_backup_households_original ON backup_households(original_id);
CREATE INDEX IF NOT EXISTS idx_backup_members_household ON backup_household_members(household_id, backup_type);

-- Reset code expiry sweep
CREATE INDEX IF NOT EXISTS idx_password_resets_expires ON password_resets(expires_at);
"#;
