//! Error types for barangay-portal

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Backup write failed: {0}")]
    BackupWrite(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PortalError {
    /// HTTP status code this error maps to at the handler boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            PortalError::Validation(_) => 400,
            PortalError::Auth(_) => 401,
            PortalError::Forbidden(_) => 403,
            PortalError::NotFound(_) => 404,
            _ => 500,
        }
    }

    /// Server-side errors have their detail redacted in production responses.
    pub fn is_internal(&self) -> bool {
        self.status_code() >= 500
    }
}
