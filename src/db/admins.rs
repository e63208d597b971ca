//! Admin account storage
//!
//! Staff credentials: unique username/email and an Argon2 PHC hash. Admin
//! accounts are outside the backup lifecycle.

use rusqlite::{params, Connection, Row};
use serde::Serialize;

use crate::error::PortalError;

/// Admin account row; the hash never leaves the server
#[derive(Debug, Clone, Serialize)]
pub struct AdminRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: String,
}

impl AdminRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            username: row.get("username")?,
            email: row.get("email")?,
            password_hash: row.get("password_hash")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Create an admin account
pub fn create_admin(
    conn: &Connection,
    username: &str,
    email: &str,
    password_hash: &str,
) -> Result<AdminRow, PortalError> {
    if username.trim().is_empty() || email.trim().is_empty() {
        return Err(PortalError::Validation(
            "username and email are required".to_string(),
        ));
    }

    conn.execute(
        "INSERT INTO admins (username, email, password_hash) VALUES (?, ?, ?)",
        params![username, email, password_hash],
    )
    .map_err(|e| PortalError::Database(format!("Insert failed: {}", e)))?;

    get_admin_by_username(conn, username)?
        .ok_or_else(|| PortalError::Internal("Admin not found after insert".to_string()))
}

fn get_admin_where(
    conn: &Connection,
    column: &str,
    value: &str,
) -> Result<Option<AdminRow>, PortalError> {
    let sql = format!("SELECT * FROM admins WHERE {} = ?", column);
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| PortalError::Database(format!("Prepare failed: {}", e)))?;

    let mut rows = stmt
        .query(params![value])
        .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))?;

    match rows
        .next()
        .map_err(|e| PortalError::Database(format!("Row fetch failed: {}", e)))?
    {
        Some(row) => Ok(Some(AdminRow::from_row(row).map_err(|e| {
            PortalError::Database(format!("Row parse failed: {}", e))
        })?)),
        None => Ok(None),
    }
}

/// Get admin by username
pub fn get_admin_by_username(
    conn: &Connection,
    username: &str,
) -> Result<Option<AdminRow>, PortalError> {
    get_admin_where(conn, "username", username)
}

/// Get admin by email
pub fn get_admin_by_email(conn: &Connection, email: &str) -> Result<Option<AdminRow>, PortalError> {
    get_admin_where(conn, "email", email)
}

/// Replace an admin's password hash (reset flow)
pub fn update_admin_password(
    conn: &Connection,
    email: &str,
    password_hash: &str,
) -> Result<(), PortalError> {
    let changes = conn
        .execute(
            "UPDATE admins SET password_hash = ? WHERE email = ?",
            params![password_hash, email],
        )
        .map_err(|e| PortalError::Database(format!("Update failed: {}", e)))?;

    if changes == 0 {
        return Err(PortalError::NotFound(format!("admin with email {email}")));
    }

    Ok(())
}

/// Number of admin accounts (used to seed the first one on startup)
pub fn admin_count(conn: &Connection) -> Result<u64, PortalError> {
    let n: i64 = conn
        .query_row("SELECT COUNT(*) FROM admins", [], |row| row.get(0))
        .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))?;
    Ok(n as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::schema::init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_create_and_lookup() {
        let conn = test_conn();
        let admin = create_admin(&conn, "secretary", "sec@brgy.ph", "$argon2id$stub").unwrap();
        assert_eq!(admin.username, "secretary");

        assert!(get_admin_by_email(&conn, "sec@brgy.ph").unwrap().is_some());
        assert!(get_admin_by_username(&conn, "nobody").unwrap().is_none());
        assert_eq!(admin_count(&conn).unwrap(), 1);
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let conn = test_conn();
        create_admin(&conn, "secretary", "a@brgy.ph", "h1").unwrap();
        assert!(create_admin(&conn, "secretary", "b@brgy.ph", "h2").is_err());
    }

    #[test]
    fn test_password_update_unknown_email() {
        let conn = test_conn();
        match update_admin_password(&conn, "ghost@brgy.ph", "h") {
            Err(PortalError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
    }
}
