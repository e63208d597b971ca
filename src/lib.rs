//! Barangay Portal - municipal e-government backend
//!
//! Residents submit certificate requests and household (RBI) registrations
//! through the public endpoints; staff review, approve, issue certificates,
//! and manage records through the admin API.
//!
//! ## Architecture
//!
//! - **Live tables**: current, queryable records (SQLite)
//! - **Shadow tables**: every create/update/delete writes a point-in-time
//!   snapshot into a `backup_*` mirror, in the same transaction as the
//!   primary mutation
//! - **Restore**: admins move snapshots back into the live tables; restore
//!   is per-item with a report, never all-or-nothing
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/barangay-portal/
//! ├── portal.db       # SQLite database (live + shadow tables)
//! ├── uploads/        # Event images
//! └── config.toml     # Configuration
//! ```

pub mod assets;
pub mod auth;
pub mod backup;
pub mod certificates;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod http;
pub mod mailer;

// Re-exports
pub use assets::AssetStore;
pub use backup::{BackupType, RestorePolicy, RestoreReport};
pub use config::Config;
pub use db::PortalDb;
pub use error::PortalError;
pub use http::HttpServer;
pub use mailer::{LogMailer, Mailer};
