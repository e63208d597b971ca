//! HTTP API for the portal
//!
//! REST endpoints, uniform per entity kind:
//!
//! ## Public
//! - `GET /health` - Health check
//! - `POST /api/auth/login` - Admin login, returns a session token
//! - `POST /api/auth/forgot` / `POST /api/auth/reset` - Password reset flow
//! - `POST /api/requests` - Submit a certificate request
//! - `POST /api/households` - Submit an RBI registration
//! - `GET /api/events` - List events
//! - `GET /api/assets/{name}` - Serve an uploaded image
//!
//! ## Admin (Bearer token)
//! - `GET/PUT/DELETE /api/<entity>/{id}` - Review, update, delete
//! - `GET /api/<entity>/backup/list` - List snapshots
//! - `POST /api/<entity>/backup/restore` - Restore snapshots
//!   (body `{ "ids": [..], "password": ".." }`; the password is re-verified)
//! - `GET /api/requests/{id}/certificate` - Issue a certificate
//! - `POST /api/requests/certificates/bundle` - Zip several certificates
//! - `GET /api/export` / `POST /api/import` - Database export and merge-import

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{header, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::assets::AssetStore;
use crate::auth::jwt::{extract_bearer, Claims, JwtValidator};
use crate::auth::password::verify_password;
use crate::certificates::{self, TemplateStore};
use crate::config::Config;
use crate::db::{admins, events, households, password_resets, requests, PortalDb};
use crate::error::PortalError;
use crate::export;
use crate::mailer::Mailer;

/// HTTP server state
pub struct HttpServer {
    db: Arc<PortalDb>,
    jwt: JwtValidator,
    assets: Arc<AssetStore>,
    mailer: Arc<dyn Mailer>,
    templates: TemplateStore,
    bind_addr: SocketAddr,
    reset_code_ttl_minutes: u32,
    restore_reset_status: bool,
    redact_errors: bool,
}

#[derive(Debug, Deserialize)]
struct LoginBody {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct ForgotBody {
    email: String,
}

#[derive(Debug, Deserialize)]
struct ResetBody {
    email: String,
    code: String,
    new_password: String,
}

/// Standard restore body, identical for every entity kind
#[derive(Debug, Deserialize)]
struct RestoreBody {
    ids: Vec<i64>,
    password: String,
}

#[derive(Debug, Deserialize)]
struct BundleBody {
    ids: Vec<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct AssetQuery {
    name: String,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(
        config: &Config,
        db: Arc<PortalDb>,
        jwt: JwtValidator,
        assets: Arc<AssetStore>,
        mailer: Arc<dyn Mailer>,
        bind_addr: SocketAddr,
    ) -> Self {
        Self {
            db,
            jwt,
            assets,
            mailer,
            templates: TemplateStore::new(config.template_dir.clone()),
            bind_addr,
            reset_code_ttl_minutes: config.reset_code_ttl_minutes,
            restore_reset_status: config.restore_reset_status,
            redact_errors: config.redact_errors,
        }
    }

    /// Run the HTTP server
    pub async fn run(self: Arc<Self>) -> Result<(), PortalError> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "HTTP server listening");

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { server.handle_request(req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(addr = %remote_addr, error = %err, "Connection error");
                }
            });
        }
    }

    /// Route requests to handlers
    async fn handle_request(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, hyper::Error> {
        let path = req.uri().path().to_string();
        let method = req.method().clone();

        debug!(method = %method, path = %path, "Incoming request");

        let result = match (method, path.as_str()) {
            // Health check
            (Method::GET, "/health") => self.handle_health().await,

            // Auth
            (Method::POST, "/api/auth/login") => self.handle_login(req).await,
            (Method::POST, "/api/auth/forgot") => self.handle_forgot(req).await,
            (Method::POST, "/api/auth/reset") => self.handle_reset(req).await,

            // Certificate requests
            (Method::POST, "/api/requests") => self.handle_create_request(req).await,
            (Method::GET, "/api/requests") => self.handle_list_requests(req).await,
            (Method::GET, "/api/requests/backup/list") => {
                self.handle_list_request_backups(req).await
            }
            (Method::POST, "/api/requests/backup/restore") => {
                self.handle_restore_requests(req).await
            }
            (Method::POST, "/api/requests/certificates/bundle") => {
                self.handle_bundle_certificates(req).await
            }
            (Method::GET, p)
                if p.starts_with("/api/requests/") && p.ends_with("/certificate") =>
            {
                let id = p
                    .strip_prefix("/api/requests/")
                    .and_then(|rest| rest.strip_suffix("/certificate"))
                    .unwrap_or("");
                self.handle_issue_certificate(req, id).await
            }
            (Method::GET, p) if p.starts_with("/api/requests/") => {
                let id = p.strip_prefix("/api/requests/").unwrap_or("");
                self.handle_get_request(req, id).await
            }
            (Method::PUT, p) if p.starts_with("/api/requests/") => {
                let id = p.strip_prefix("/api/requests/").unwrap_or("").to_string();
                self.handle_update_request(req, &id).await
            }
            (Method::DELETE, p) if p.starts_with("/api/requests/") => {
                let id = p.strip_prefix("/api/requests/").unwrap_or("").to_string();
                self.handle_delete_request(req, &id).await
            }

            // Events
            (Method::POST, "/api/events") => self.handle_create_event(req).await,
            (Method::GET, "/api/events") => self.handle_list_events(req).await,
            (Method::GET, "/api/events/backup/list") => self.handle_list_event_backups(req).await,
            (Method::POST, "/api/events/backup/restore") => self.handle_restore_events(req).await,
            (Method::GET, p) if p.starts_with("/api/events/") => {
                let id = p.strip_prefix("/api/events/").unwrap_or("");
                self.handle_get_event(id).await
            }
            (Method::PUT, p) if p.starts_with("/api/events/") => {
                let id = p.strip_prefix("/api/events/").unwrap_or("").to_string();
                self.handle_update_event(req, &id).await
            }
            (Method::DELETE, p) if p.starts_with("/api/events/") => {
                let id = p.strip_prefix("/api/events/").unwrap_or("").to_string();
                self.handle_delete_event(req, &id).await
            }

            // RBI households and members
            (Method::POST, "/api/households") => self.handle_create_household(req).await,
            (Method::GET, "/api/households") => self.handle_list_households(req).await,
            (Method::GET, "/api/households/backup/list") => {
                self.handle_list_household_backups(req).await
            }
            (Method::POST, "/api/households/backup/restore") => {
                self.handle_restore_households(req).await
            }
            (Method::POST, p)
                if p.starts_with("/api/households/") && p.ends_with("/members") =>
            {
                let id = p
                    .strip_prefix("/api/households/")
                    .and_then(|rest| rest.strip_suffix("/members"))
                    .unwrap_or("")
                    .to_string();
                self.handle_add_member(req, &id).await
            }
            (Method::GET, p) if p.starts_with("/api/households/") => {
                let id = p.strip_prefix("/api/households/").unwrap_or("");
                self.handle_get_household(req, id).await
            }
            (Method::PUT, p) if p.starts_with("/api/households/") => {
                let id = p.strip_prefix("/api/households/").unwrap_or("").to_string();
                self.handle_update_household(req, &id).await
            }
            (Method::DELETE, p) if p.starts_with("/api/households/") => {
                let id = p.strip_prefix("/api/households/").unwrap_or("").to_string();
                self.handle_delete_household(req, &id).await
            }
            (Method::GET, "/api/members/backup/list") => {
                self.handle_list_member_backups(req).await
            }
            (Method::POST, "/api/members/backup/restore") => {
                self.handle_restore_members(req).await
            }
            (Method::PUT, p) if p.starts_with("/api/members/") => {
                let id = p.strip_prefix("/api/members/").unwrap_or("").to_string();
                self.handle_update_member(req, &id).await
            }
            (Method::DELETE, p) if p.starts_with("/api/members/") => {
                let id = p.strip_prefix("/api/members/").unwrap_or("").to_string();
                self.handle_delete_member(req, &id).await
            }

            // Uploaded assets
            (Method::POST, "/api/assets") => self.handle_store_asset(req).await,
            (Method::GET, p) if p.starts_with("/api/assets/") => {
                let name = p.strip_prefix("/api/assets/").unwrap_or("").to_string();
                self.handle_get_asset(&name).await
            }

            // Export / import
            (Method::GET, "/api/export") => self.handle_export(req).await,
            (Method::POST, "/api/import") => self.handle_import(req).await,

            // Not found
            _ => Err(PortalError::NotFound(format!("no route for {path}"))),
        };

        match result {
            Ok(response) => Ok(response),
            Err(e) => Ok(self.error_response(e)),
        }
    }

    // ------------------------------------------------------------------
    // Shared plumbing
    // ------------------------------------------------------------------

    /// Validate the bearer token on an admin endpoint
    fn authorize(&self, req: &Request<Incoming>) -> Result<Claims, PortalError> {
        let header = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let token = extract_bearer(header)
            .ok_or_else(|| PortalError::Auth("missing bearer token".to_string()))?;

        self.jwt.validate(token)
    }

    /// Step-up check: re-verify the session admin's password before a restore
    fn verify_step_up(&self, claims: &Claims, password: &str) -> Result<(), PortalError> {
        let admin = self
            .db
            .with_conn(|conn| admins::get_admin_by_username(conn, &claims.sub))?
            .ok_or_else(|| PortalError::Auth(format!("unknown admin {}", claims.sub)))?;

        if !verify_password(password, &admin.password_hash)? {
            warn!(admin = %claims.sub, "Step-up password verification failed");
            return Err(PortalError::Forbidden(
                "password re-verification failed".to_string(),
            ));
        }

        Ok(())
    }

    fn error_response(&self, e: PortalError) -> Response<Full<Bytes>> {
        let status =
            StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = if e.is_internal() {
            error!(error = %e, "Request error");
            if self.redact_errors {
                "internal server error".to_string()
            } else {
                e.to_string()
            }
        } else {
            e.to_string()
        };

        let body = serde_json::json!({ "error": message });
        json_response(status, &body)
    }

    // ------------------------------------------------------------------
    // Health
    // ------------------------------------------------------------------

    async fn handle_health(&self) -> Result<Response<Full<Bytes>>, PortalError> {
        let stats = self.db.stats()?;
        let body = serde_json::json!({
            "status": "ok",
            "requests": stats.requests,
            "events": stats.events,
            "households": stats.households,
            "members": stats.members,
            "shadow_rows": stats.shadow_rows,
        });

        Ok(json_response(StatusCode::OK, &body))
    }

    // ------------------------------------------------------------------
    // Auth
    // ------------------------------------------------------------------

    async fn handle_login(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        let body: LoginBody = read_json(req).await?;

        let admin = self
            .db
            .with_conn(|conn| admins::get_admin_by_username(conn, &body.username))?
            .ok_or_else(|| PortalError::Auth("invalid credentials".to_string()))?;

        if !verify_password(&body.password, &admin.password_hash)? {
            return Err(PortalError::Auth("invalid credentials".to_string()));
        }

        let token = self.jwt.issue(&admin.username)?;
        info!(admin = %admin.username, "Admin logged in");

        Ok(json_response(
            StatusCode::OK,
            &serde_json::json!({ "token": token }),
        ))
    }

    async fn handle_forgot(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        let body: ForgotBody = read_json(req).await?;

        // Same response whether or not the account exists
        if let Some(admin) = self
            .db
            .with_conn(|conn| admins::get_admin_by_email(conn, &body.email))?
        {
            let ttl = self.reset_code_ttl_minutes;
            let code = self
                .db
                .with_conn(|conn| password_resets::create_reset_code(conn, &admin.email, ttl))?;
            self.mailer.send_reset_code(&admin.email, &code).await?;
            info!(email = %admin.email, "Issued password reset code");
        }

        Ok(message_response(
            StatusCode::OK,
            "if the account exists, a reset code has been sent",
        ))
    }

    async fn handle_reset(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        let body: ResetBody = read_json(req).await?;

        if body.new_password.len() < 8 {
            return Err(PortalError::Validation(
                "new_password must be at least 8 characters".to_string(),
            ));
        }

        self.db
            .with_conn(|conn| password_resets::consume_reset_code(conn, &body.email, &body.code))?;

        let hash = crate::auth::password::hash_password(&body.new_password)?;
        self.db
            .with_conn(|conn| admins::update_admin_password(conn, &body.email, &hash))?;

        info!(email = %body.email, "Password reset completed");
        Ok(message_response(StatusCode::OK, "password updated"))
    }

    // ------------------------------------------------------------------
    // Certificate requests
    // ------------------------------------------------------------------

    async fn handle_create_request(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        let input: requests::CreateRequestInput = read_json(req).await?;
        let row = self
            .db
            .with_conn_mut(|conn| requests::create_request(conn, input))?;

        info!(id = row.id, certificate = %row.certificate_type.as_str(), "Request submitted");
        Ok(json_response(StatusCode::CREATED, &row))
    }

    async fn handle_list_requests(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        self.authorize(&req)?;
        let query: requests::RequestQuery = parse_query(&req)?;
        let rows = self
            .db
            .with_conn(|conn| requests::list_requests(conn, &query))?;
        Ok(json_response(StatusCode::OK, &rows))
    }

    async fn handle_get_request(
        &self,
        req: Request<Incoming>,
        id: &str,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        self.authorize(&req)?;
        let id = parse_id(id)?;
        let row = self
            .db
            .with_conn(|conn| requests::get_request(conn, id))?
            .ok_or_else(|| PortalError::NotFound(format!("request {id}")))?;
        Ok(json_response(StatusCode::OK, &row))
    }

    async fn handle_update_request(
        &self,
        req: Request<Incoming>,
        id: &str,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        self.authorize(&req)?;
        let id = parse_id(id)?;
        let input: requests::UpdateRequestInput = read_json(req).await?;
        let row = self
            .db
            .with_conn_mut(|conn| requests::update_request(conn, id, input))?;
        Ok(json_response(StatusCode::OK, &row))
    }

    async fn handle_delete_request(
        &self,
        req: Request<Incoming>,
        id: &str,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        self.authorize(&req)?;
        let id = parse_id(id)?;
        self.db
            .with_conn_mut(|conn| requests::delete_request(conn, id))?;
        info!(id = id, "Request deleted");
        Ok(message_response(StatusCode::OK, "request deleted"))
    }

    async fn handle_list_request_backups(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        self.authorize(&req)?;
        let rows = self.db.with_conn(requests::list_request_backups)?;
        Ok(json_response(StatusCode::OK, &rows))
    }

    async fn handle_restore_requests(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        let claims = self.authorize(&req)?;
        let body: RestoreBody = read_json(req).await?;
        require_ids(&body.ids)?;
        self.verify_step_up(&claims, &body.password)?;

        let policy = requests::default_restore_policy(self.restore_reset_status);
        let report = self
            .db
            .with_conn_mut(|conn| Ok(requests::restore_requests(conn, &body.ids, &policy)))?;

        info!(
            restored = report.success_count(),
            failed = report.failures.len(),
            "Restored requests"
        );
        Ok(json_response(StatusCode::OK, &report))
    }

    async fn handle_issue_certificate(
        &self,
        req: Request<Incoming>,
        id: &str,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        self.authorize(&req)?;
        let id = parse_id(id)?;

        let row = self
            .db
            .with_conn(|conn| requests::get_request(conn, id))?
            .ok_or_else(|| PortalError::NotFound(format!("request {id}")))?;

        if row.status != requests::RequestStatus::Approved {
            return Err(PortalError::Validation(format!(
                "request {id} is {}, only approved requests can be issued",
                row.status.as_str()
            )));
        }

        let certificate = certificates::render_certificate(&self.templates, &row)?;
        let issued = self
            .db
            .with_conn_mut(|conn| requests::mark_for_pickup(conn, id))?;

        info!(id = id, status = %issued.status.as_str(), "Certificate issued");

        Ok(Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .header(
                header::CONTENT_DISPOSITION,
                format!(
                    "attachment; filename=\"{}\"",
                    certificates::certificate_file_name(&row)
                ),
            )
            .body(Full::new(Bytes::from(certificate)))
            .unwrap())
    }

    async fn handle_bundle_certificates(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        self.authorize(&req)?;
        let body: BundleBody = read_json(req).await?;
        require_ids(&body.ids)?;

        let mut rendered = Vec::new();
        let mut skipped = 0usize;

        for id in &body.ids {
            let row = match self.db.with_conn(|conn| requests::get_request(conn, *id))? {
                Some(row) if row.status == requests::RequestStatus::Approved => row,
                Some(row) => {
                    warn!(id = id, status = %row.status.as_str(), "Skipping unapproved request in bundle");
                    skipped += 1;
                    continue;
                }
                None => {
                    warn!(id = id, "Skipping missing request in bundle");
                    skipped += 1;
                    continue;
                }
            };

            let certificate = certificates::render_certificate(&self.templates, &row)?;
            self.db
                .with_conn_mut(|conn| requests::mark_for_pickup(conn, *id))?;
            rendered.push((certificates::certificate_file_name(&row), certificate));
        }

        let archive = certificates::bundle(&rendered)?;
        info!(
            bundled = rendered.len(),
            skipped = skipped,
            "Certificate bundle created"
        );

        Ok(Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/zip")
            .header(
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"certificates.zip\"",
            )
            .header("X-Bundle-Skipped", skipped.to_string())
            .body(Full::new(Bytes::from(archive)))
            .unwrap())
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    async fn handle_create_event(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        self.authorize(&req)?;
        let input: events::CreateEventInput = read_json(req).await?;
        let row = self.db.with_conn_mut(|conn| events::create_event(conn, input))?;

        info!(id = row.id, title = %row.title, "Event created");
        Ok(json_response(StatusCode::CREATED, &row))
    }

    async fn handle_list_events(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        let query: events::EventQuery = parse_query(&req)?;
        let rows = self.db.with_conn(|conn| events::list_events(conn, &query))?;
        Ok(json_response(StatusCode::OK, &rows))
    }

    async fn handle_get_event(&self, id: &str) -> Result<Response<Full<Bytes>>, PortalError> {
        let id = parse_id(id)?;
        let row = self
            .db
            .with_conn(|conn| events::get_event(conn, id))?
            .ok_or_else(|| PortalError::NotFound(format!("event {id}")))?;
        Ok(json_response(StatusCode::OK, &row))
    }

    async fn handle_update_event(
        &self,
        req: Request<Incoming>,
        id: &str,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        self.authorize(&req)?;
        let id = parse_id(id)?;
        let input: events::UpdateEventInput = read_json(req).await?;
        let row = self
            .db
            .with_conn_mut(|conn| events::update_event(conn, id, input))?;
        Ok(json_response(StatusCode::OK, &row))
    }

    async fn handle_delete_event(
        &self,
        req: Request<Incoming>,
        id: &str,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        self.authorize(&req)?;
        let id = parse_id(id)?;
        let deleted = self.db.with_conn_mut(|conn| events::delete_event(conn, id))?;

        // Asset cleanup is fire-and-forget; the record delete already committed
        if let Some(image) = deleted.image_path {
            self.assets.spawn_delete(image);
        }

        info!(id = id, "Event deleted");
        Ok(message_response(StatusCode::OK, "event deleted"))
    }

    async fn handle_list_event_backups(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        self.authorize(&req)?;
        let rows = self.db.with_conn(events::list_event_backups)?;
        Ok(json_response(StatusCode::OK, &rows))
    }

    async fn handle_restore_events(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        let claims = self.authorize(&req)?;
        let body: RestoreBody = read_json(req).await?;
        require_ids(&body.ids)?;
        self.verify_step_up(&claims, &body.password)?;

        let policy = crate::backup::RestorePolicy::preserve();
        let report = self
            .db
            .with_conn_mut(|conn| Ok(events::restore_events(conn, &body.ids, &policy)))?;

        info!(
            restored = report.success_count(),
            failed = report.failures.len(),
            "Restored events"
        );
        Ok(json_response(StatusCode::OK, &report))
    }

    // ------------------------------------------------------------------
    // RBI households and members
    // ------------------------------------------------------------------

    async fn handle_create_household(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        let input: households::CreateHouseholdInput = read_json(req).await?;
        let row = self
            .db
            .with_conn_mut(|conn| households::create_household(conn, input))?;

        info!(id = row.id, members = row.members.len(), "Household registered");
        Ok(json_response(StatusCode::CREATED, &row))
    }

    async fn handle_list_households(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        self.authorize(&req)?;
        let query: households::HouseholdQuery = parse_query(&req)?;
        let rows = self
            .db
            .with_conn(|conn| households::list_households(conn, &query))?;
        Ok(json_response(StatusCode::OK, &rows))
    }

    async fn handle_get_household(
        &self,
        req: Request<Incoming>,
        id: &str,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        self.authorize(&req)?;
        let id = parse_id(id)?;
        let row = self
            .db
            .with_conn(|conn| households::get_household(conn, id))?
            .ok_or_else(|| PortalError::NotFound(format!("household {id}")))?;
        Ok(json_response(StatusCode::OK, &row))
    }

    async fn handle_update_household(
        &self,
        req: Request<Incoming>,
        id: &str,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        self.authorize(&req)?;
        let id = parse_id(id)?;
        let input: households::UpdateHouseholdInput = read_json(req).await?;
        let row = self
            .db
            .with_conn_mut(|conn| households::update_household(conn, id, input))?;
        Ok(json_response(StatusCode::OK, &row))
    }

    async fn handle_delete_household(
        &self,
        req: Request<Incoming>,
        id: &str,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        self.authorize(&req)?;
        let id = parse_id(id)?;
        self.db
            .with_conn_mut(|conn| households::delete_household(conn, id))?;
        info!(id = id, "Household deleted");
        Ok(message_response(StatusCode::OK, "household deleted"))
    }

    async fn handle_add_member(
        &self,
        req: Request<Incoming>,
        household_id: &str,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        self.authorize(&req)?;
        let household_id = parse_id(household_id)?;
        let input: households::CreateMemberInput = read_json(req).await?;
        let row = self
            .db
            .with_conn_mut(|conn| households::add_member(conn, household_id, input))?;
        Ok(json_response(StatusCode::CREATED, &row))
    }

    async fn handle_update_member(
        &self,
        req: Request<Incoming>,
        id: &str,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        self.authorize(&req)?;
        let id = parse_id(id)?;
        let input: households::UpdateMemberInput = read_json(req).await?;
        let row = self
            .db
            .with_conn_mut(|conn| households::update_member(conn, id, input))?;
        Ok(json_response(StatusCode::OK, &row))
    }

    async fn handle_delete_member(
        &self,
        req: Request<Incoming>,
        id: &str,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        self.authorize(&req)?;
        let id = parse_id(id)?;
        self.db
            .with_conn_mut(|conn| households::delete_member(conn, id))?;
        Ok(message_response(StatusCode::OK, "member deleted"))
    }

    async fn handle_list_household_backups(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        self.authorize(&req)?;
        let rows = self.db.with_conn(households::list_household_backups)?;
        Ok(json_response(StatusCode::OK, &rows))
    }

    async fn handle_list_member_backups(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        self.authorize(&req)?;
        let rows = self.db.with_conn(households::list_member_backups)?;
        Ok(json_response(StatusCode::OK, &rows))
    }

    async fn handle_restore_households(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        let claims = self.authorize(&req)?;
        let body: RestoreBody = read_json(req).await?;
        require_ids(&body.ids)?;
        self.verify_step_up(&claims, &body.password)?;

        let policy = households::default_restore_policy(self.restore_reset_status);
        let report = self
            .db
            .with_conn_mut(|conn| Ok(households::restore_households(conn, &body.ids, &policy)))?;

        info!(
            restored = report.success_count(),
            failed = report.failures.len(),
            "Restored households"
        );
        Ok(json_response(StatusCode::OK, &report))
    }

    async fn handle_restore_members(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        let claims = self.authorize(&req)?;
        let body: RestoreBody = read_json(req).await?;
        require_ids(&body.ids)?;
        self.verify_step_up(&claims, &body.password)?;

        let policy = crate::backup::RestorePolicy::preserve();
        let report = self
            .db
            .with_conn_mut(|conn| Ok(households::restore_members(conn, &body.ids, &policy)))?;

        Ok(json_response(StatusCode::OK, &report))
    }

    // ------------------------------------------------------------------
    // Uploaded assets
    // ------------------------------------------------------------------

    async fn handle_store_asset(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        self.authorize(&req)?;
        let query: AssetQuery = parse_query(&req)?;

        let body = req
            .collect()
            .await
            .map_err(|e| PortalError::Internal(format!("Failed to read body: {}", e)))?;
        let data = body.to_bytes();

        if data.is_empty() {
            return Err(PortalError::Validation("empty upload".to_string()));
        }

        let path = self.assets.store(&query.name, &data).await?;
        Ok(json_response(
            StatusCode::CREATED,
            &serde_json::json!({ "path": path }),
        ))
    }

    async fn handle_get_asset(&self, name: &str) -> Result<Response<Full<Bytes>>, PortalError> {
        let data = self.assets.read(name).await?;

        Ok(Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type_for(name))
            .header(header::CONTENT_LENGTH, data.len())
            .body(Full::new(Bytes::from(data)))
            .unwrap())
    }

    // ------------------------------------------------------------------
    // Export / import
    // ------------------------------------------------------------------

    async fn handle_export(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        self.authorize(&req)?;
        let doc = self.db.with_conn(export::export_all)?;
        Ok(json_response(StatusCode::OK, &doc))
    }

    async fn handle_import(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        self.authorize(&req)?;
        let doc: export::ExportDocument = read_json(req).await?;
        let report = self.db.with_conn_mut(|conn| export::import_all(conn, doc))?;
        Ok(json_response(StatusCode::OK, &report))
    }
}

// ----------------------------------------------------------------------
// Free helpers
// ----------------------------------------------------------------------

/// Read and deserialize a JSON request body
async fn read_json<T: DeserializeOwned>(req: Request<Incoming>) -> Result<T, PortalError> {
    let body = req
        .collect()
        .await
        .map_err(|e| PortalError::Internal(format!("Failed to read body: {}", e)))?;

    serde_json::from_slice(&body.to_bytes())
        .map_err(|e| PortalError::Validation(format!("invalid JSON body: {}", e)))
}

/// Deserialize the query string, falling back to defaults when absent
fn parse_query<T: DeserializeOwned + Default>(req: &Request<Incoming>) -> Result<T, PortalError> {
    match req.uri().query() {
        Some(q) => serde_urlencoded::from_str(q)
            .map_err(|e| PortalError::Validation(format!("invalid query string: {}", e))),
        None => Ok(T::default()),
    }
}

fn parse_id(s: &str) -> Result<i64, PortalError> {
    s.parse()
        .map_err(|_| PortalError::Validation(format!("invalid id: {s}")))
}

fn require_ids(ids: &[i64]) -> Result<(), PortalError> {
    if ids.is_empty() {
        return Err(PortalError::Validation("ids is required".to_string()));
    }
    Ok(())
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

fn message_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(status, &serde_json::json!({ "message": message }))
}

fn content_type_for(name: &str) -> &'static str {
    match name.rsplit('.').next() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use crate::mailer::LogMailer;
    use tempfile::TempDir;

    fn test_server(tmp: &TempDir) -> HttpServer {
        let db = Arc::new(PortalDb::open_in_memory().unwrap());
        let hash = hash_password("tanod-on-duty").unwrap();
        db.with_conn(|conn| admins::create_admin(conn, "secretary", "sec@brgy.ph", &hash))
            .unwrap();

        HttpServer::new(
            &Config::default(),
            db,
            JwtValidator::new("test-secret", 3600),
            Arc::new(AssetStore::new(tmp.path().join("uploads")).unwrap()),
            Arc::new(LogMailer),
            "127.0.0.1:0".parse().unwrap(),
        )
    }

    #[test]
    fn test_step_up_rejects_wrong_password() {
        let tmp = TempDir::new().unwrap();
        let server = test_server(&tmp);
        let claims = server.jwt.validate(&server.jwt.issue("secretary").unwrap()).unwrap();

        server.verify_step_up(&claims, "tanod-on-duty").unwrap();

        match server.verify_step_up(&claims, "wrong-password") {
            Err(PortalError::Forbidden(_)) => {}
            other => panic!("expected Forbidden, got {:?}", other),
        }
    }

    #[test]
    fn test_step_up_unknown_admin() {
        let tmp = TempDir::new().unwrap();
        let server = test_server(&tmp);
        let claims = Claims {
            sub: "ghost".to_string(),
            iat: 0,
            exp: i64::MAX,
        };

        match server.verify_step_up(&claims, "whatever") {
            Err(PortalError::Auth(_)) => {}
            other => panic!("expected Auth, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert!(parse_id("forty-two").is_err());
        assert!(parse_id("").is_err());
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("poster.jpg"), "image/jpeg");
        assert_eq!(content_type_for("poster.png"), "image/png");
        assert_eq!(content_type_for("notes"), "application/octet-stream");
    }

    #[test]
    fn test_require_ids() {
        assert!(require_ids(&[]).is_err());
        assert!(require_ids(&[1]).is_ok());
    }
}
