//! Barangay Portal Daemon
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults
//! barangay-portal
//!
//! # Start with custom config
//! barangay-portal --config /path/to/config.toml
//!
//! # Start with custom HTTP port
//! barangay-portal --http-port 8081
//!
//! # Start with custom storage directory
//! barangay-portal --storage-dir /data/portal
//! ```

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use barangay_portal::auth::jwt::JwtValidator;
use barangay_portal::auth::password::hash_password;
use barangay_portal::db::admins;
use barangay_portal::{AssetStore, Config, HttpServer, LogMailer, PortalDb};

#[derive(Parser, Debug)]
#[command(name = "barangay-portal")]
#[command(about = "Barangay e-government portal backend")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Storage directory
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// HTTP API port
    #[arg(long)]
    http_port: Option<u16>,

    /// Secret for signing session tokens
    #[arg(long, env = "JWT_SECRET")]
    jwt_secret: Option<String>,

    /// Password for the seeded admin account (first start only)
    #[arg(long, env = "INITIAL_ADMIN_PASSWORD")]
    initial_admin_password: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("barangay_portal=info".parse()?),
        )
        .init();

    let args = Args::parse();

    // Load config
    let mut config = if let Some(config_path) = &args.config {
        Config::load(config_path)?
    } else {
        Config::default()
    };

    // Apply CLI overrides
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    if args.jwt_secret.is_some() {
        config.jwt_secret = args.jwt_secret;
    }
    if args.initial_admin_password.is_some() {
        config.initial_admin_password = args.initial_admin_password;
    }

    info!(
        storage_dir = %config.storage_dir.display(),
        http_port = config.http_port,
        "Starting barangay-portal"
    );

    // Ensure storage directory exists
    tokio::fs::create_dir_all(&config.storage_dir).await?;

    // Save default config if it doesn't exist
    let config_path = config.config_path();
    if !config_path.exists() {
        config.save(&config_path)?;
        info!(path = %config_path.display(), "Created default config");
    }

    // Open database
    let db = Arc::new(PortalDb::open(&config.storage_dir)?);

    // Seed the first admin account
    seed_admin(&db, &config)?;

    // Session token signing key
    let jwt_secret = match config.jwt_secret.clone() {
        Some(secret) => secret,
        None => {
            warn!("No jwt_secret configured; generating an ephemeral one (sessions will not survive restarts)");
            random_secret()
        }
    };
    let jwt = JwtValidator::new(&jwt_secret, config.jwt_expiry_seconds);

    // Asset store for event images
    let assets = Arc::new(AssetStore::new(config.uploads_dir())?);

    // Start HTTP server
    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let http_server = Arc::new(HttpServer::new(
        &config,
        db.clone(),
        jwt,
        assets,
        Arc::new(LogMailer),
        http_addr,
    ));

    info!("HTTP API available at http://{}", http_addr);
    info!("Endpoints:");
    info!("  GET  /health                          - Health check");
    info!("  POST /api/auth/login                  - Admin login");
    info!("  POST /api/requests                    - Submit certificate request");
    info!("  POST /api/households                  - Submit RBI registration");
    info!("  GET  /api/events                      - List events");
    info!("  GET  /api/<entity>/backup/list        - List snapshots (admin)");
    info!("  POST /api/<entity>/backup/restore     - Restore snapshots (admin)");
    info!("  GET  /api/export                      - Export database (admin)");

    info!("Press Ctrl+C to stop.");

    // Handle shutdown signal
    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
    };

    tokio::select! {
        result = http_server.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server error");
            }
        }
        _ = shutdown => {}
    }

    // Print stats before exit
    if let Ok(stats) = db.stats() {
        info!(
            requests = stats.requests,
            households = stats.households,
            shadow_rows = stats.shadow_rows,
            "Final database stats"
        );
    }

    Ok(())
}

/// Create the first admin account if none exists
fn seed_admin(db: &PortalDb, config: &Config) -> anyhow::Result<()> {
    let count = db.with_conn(admins::admin_count)?;
    if count > 0 {
        return Ok(());
    }

    let password = match config.initial_admin_password.clone() {
        Some(p) => p,
        None => {
            let generated = random_secret();
            warn!(
                username = %config.initial_admin_username,
                password = %generated,
                "No initial admin password configured; generated one (change it immediately)"
            );
            generated
        }
    };

    let hash = hash_password(&password)?;
    db.with_conn(|conn| {
        admins::create_admin(
            conn,
            &config.initial_admin_username,
            &config.initial_admin_email,
            &hash,
        )
    })?;

    info!(username = %config.initial_admin_username, "Seeded admin account");
    Ok(())
}

fn random_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect()
}
