//! Time-boxed password reset codes
//!
//! Codes live in the database rather than process memory so they survive
//! restarts. Expiry is enforced in SQL against `datetime('now')`; expired
//! rows are swept opportunistically on every insert and consume.

use rand::Rng;
use rusqlite::{params, Connection};

use crate::error::PortalError;

/// Create a reset code for an email, valid for `ttl_minutes`
pub fn create_reset_code(
    conn: &Connection,
    email: &str,
    ttl_minutes: u32,
) -> Result<String, PortalError> {
    purge_expired(conn)?;

    let code = generate_code();

    conn.execute(
        "INSERT OR REPLACE INTO password_resets (email, code, expires_at)
         VALUES (?, ?, datetime('now', ?))",
        params![email, code, format!("+{} minutes", ttl_minutes)],
    )
    .map_err(|e| PortalError::Database(format!("Insert failed: {}", e)))?;

    Ok(code)
}

/// Consume a reset code: valid and unexpired codes are removed and accepted
/// exactly once
pub fn consume_reset_code(conn: &Connection, email: &str, code: &str) -> Result<(), PortalError> {
    purge_expired(conn)?;

    let changes = conn
        .execute(
            "DELETE FROM password_resets
             WHERE email = ? AND code = ? AND expires_at > datetime('now')",
            params![email, code],
        )
        .map_err(|e| PortalError::Database(format!("Delete failed: {}", e)))?;

    if changes == 0 {
        return Err(PortalError::Validation(
            "invalid or expired reset code".to_string(),
        ));
    }

    Ok(())
}

/// Remove expired codes
pub fn purge_expired(conn: &Connection) -> Result<u64, PortalError> {
    let changes = conn
        .execute(
            "DELETE FROM password_resets WHERE expires_at <= datetime('now')",
            [],
        )
        .map_err(|e| PortalError::Database(format!("Delete failed: {}", e)))?;
    Ok(changes as u64)
}

/// Six digit numeric code, matching what residents expect from SMS/email flows
fn generate_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", n)
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
    fn test_code_is_single_use() {
        let conn = test_conn();
        let code = create_reset_code(&conn, "sec@brgy.ph", 15).unwrap();
        assert_eq!(code.len(), 6);

        consume_reset_code(&conn, "sec@brgy.ph", &code).unwrap();

        match consume_reset_code(&conn, "sec@brgy.ph", &code) {
            Err(PortalError::Validation(_)) => {}
            other => panic!("expected Validation, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_code_rejected() {
        let conn = test_conn();
        conn.execute(
            "INSERT INTO password_resets (email, code, expires_at)
             VALUES (?, ?, datetime('now', '+15 minutes'))",
            params![&"sec@brgy.ph", &"123456"],
        )
        .unwrap();
        assert!(consume_reset_code(&conn, "sec@brgy.ph", "654321").is_err());
        // the stored code is untouched by the failed attempt
        consume_reset_code(&conn, "sec@brgy.ph", "123456").unwrap();
    }

    #[test]
    fn test_expired_code_rejected_and_purged() {
        let conn = test_conn();
        let code = generate_code();

        // insert an already-expired row directly
        conn.execute(
            "INSERT INTO password_resets (email, code, expires_at)
             VALUES (?, ?, datetime('now', '-1 minutes'))",
            params![&"sec@brgy.ph", &code],
        )
        .unwrap();

        assert!(consume_reset_code(&conn, "sec@brgy.ph", &code).is_err());

        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM password_resets", [], |r| r.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
