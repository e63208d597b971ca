//! Configuration for barangay-portal

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default storage directory
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("barangay-portal")
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Storage directory for the database and uploaded assets
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// HTTP API port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Secret for signing session tokens (generated at startup if unset)
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// Session token lifetime in seconds
    #[serde(default = "default_jwt_expiry")]
    pub jwt_expiry_seconds: i64,

    /// Password reset code lifetime in minutes
    #[serde(default = "default_reset_ttl")]
    pub reset_code_ttl_minutes: u32,

    /// Reset status-bearing records to their default status on restore
    #[serde(default = "default_true")]
    pub restore_reset_status: bool,

    /// Redact internal error details from HTTP responses
    #[serde(default = "default_true")]
    pub redact_errors: bool,

    /// Directory of certificate templates (falls back to the built-in template)
    #[serde(default)]
    pub template_dir: Option<PathBuf>,

    /// Username for the admin account seeded on first start
    #[serde(default = "default_admin_username")]
    pub initial_admin_username: String,

    /// Email for the seeded admin account
    #[serde(default = "default_admin_email")]
    pub initial_admin_email: String,

    /// Password for the seeded admin account (generated and logged if unset)
    #[serde(default)]
    pub initial_admin_password: Option<String>,
}

fn default_http_port() -> u16 {
    8080
}

fn default_jwt_expiry() -> i64 {
    28_800
}

fn default_reset_ttl() -> u32 {
    15
}

fn default_true() -> bool {
    true
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_admin_email() -> String {
    "admin@localhost".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            http_port: default_http_port(),
            jwt_secret: None,
            jwt_expiry_seconds: default_jwt_expiry(),
            reset_code_ttl_minutes: default_reset_ttl(),
            restore_reset_status: true,
            redact_errors: true,
            template_dir: None,
            initial_admin_username: default_admin_username(),
            initial_admin_email: default_admin_email(),
            initial_admin_password: None,
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Get uploads directory for event images
    pub fn uploads_dir(&self) -> PathBuf {
        self.storage_dir.join("uploads")
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.storage_dir.join("config.toml")
    }
}
