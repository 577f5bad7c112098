//!
//! expedientes HTTP server
//! -----------------------
//! Axum-based HTTP API for the case-file service.
//!
//! Responsibilities:
//! - Session endpoints: `/login` issues a signed token, `/currentUser` re-issues it.
//! - Account and role administration backed by the directory collaborators.
//! - Data-service dispatch (`/api/{entity}/{action}`) with permission checks.
//! - Attachment upload/download through the file store.
//!
//! There is no server-side session table: every protected request carries its bearer token.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{DefaultBodyLimit, Path};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::datasvc::{DataService, Entity, GuardedDataService, MemoryDataService, PgDataService};
use crate::directory::{AccountDirectory, MemoryDirectory, RoleDirectory, ServiceDirectory};
use crate::error::{AppError, AppResult};
use crate::filestore::{FileStore, LocalFileStore};
use crate::identity::{AuthProvider, DirectoryAuthProvider, PermissionSet, TokenService};

pub mod admin;
pub mod auth;
pub mod data;
pub mod files;
pub mod session;

/// Largest accepted attachment.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// How strictly API calls are checked and how much upstream detail reaches clients.
#[derive(Debug, Clone, Copy)]
pub struct ApiPolicy {
    /// When false only authentication is required, as the UI alone hides actions.
    pub enforce_permissions: bool,
    pub redact_upstream: bool,
}

impl Default for ApiPolicy {
    fn default() -> Self { Self { enforce_permissions: true, redact_upstream: false } }
}

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn AccountDirectory>,
    pub roles: Arc<dyn RoleDirectory>,
    pub data: Arc<dyn DataService>,
    pub files: Arc<dyn FileStore>,
    pub tokens: Arc<TokenService>,
    pub auth: Arc<dyn AuthProvider>,
    pub policy: ApiPolicy,
}

impl AppState {
    pub fn new(
        accounts: Arc<dyn AccountDirectory>,
        roles: Arc<dyn RoleDirectory>,
        data: Arc<dyn DataService>,
        files: Arc<dyn FileStore>,
        tokens: Arc<TokenService>,
        policy: ApiPolicy,
    ) -> Self {
        let auth = Arc::new(DirectoryAuthProvider::new(accounts.clone(), roles.clone(), tokens.clone()));
        Self { accounts, roles, data, files, tokens, auth, policy }
    }

    /// Translate a collaborator failure, logging the detail and redacting it when configured.
    pub fn upstream(&self, err: anyhow::Error) -> AppError {
        self.surface(AppError::from(err))
    }

    /// Final shaping of an error before it reaches the client.
    pub fn surface(&self, app: AppError) -> AppError {
        if let AppError::Upstream { message, .. } = &app {
            error!(target: "datasvc", error = %message, "upstream failure");
        }
        if self.policy.redact_upstream { app.redacted() } else { app }
    }
}

/// Every permission string the application knows about.
pub fn all_permissions() -> PermissionSet {
    Entity::DISPATCHABLE
        .iter()
        .chain([Entity::Usuarios, Entity::Roles].iter())
        .map(|e| e.permission())
        .collect()
}

/// Unwrap a JSON body, reporting malformed input as a 400 with the usual error body.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    match body {
        Ok(Json(v)) => Ok(v),
        Err(rej) => Err(AppError::user("invalid_body", rej.body_text().as_str())),
    }
}

/// Unwrap a numeric `{id}` path segment with the same error body as [`json_body`].
pub(crate) fn path_id(id: Result<Path<i64>, PathRejection>) -> AppResult<i64> {
    match id {
        Ok(Path(id)) => Ok(id),
        Err(rej) => Err(AppError::user("invalid_id", rej.body_text().as_str())),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "expedientes ok" }))
        .route("/login", post(session::login))
        .route("/currentUser", get(session::current_user))
        .route("/usuarios", get(admin::list_accounts).post(admin::register_account))
        .route("/usuarios/password", put(admin::change_own_password))
        .route("/usuarios/{id}", put(admin::update_account).delete(admin::deactivate_account))
        .route("/roles", get(admin::list_roles).post(admin::create_role))
        .route("/roles/{id}", put(admin::update_role).delete(admin::delete_role))
        .route("/api/{entity}/{action}", post(data::dispatch))
        .route(
            "/archivos/{nombre}",
            post(files::upload).get(files::download).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .with_state(state)
}

/// Assemble collaborators from configuration. A missing signing secret is fatal.
pub async fn build_state(config: &ServerConfig) -> anyhow::Result<AppState> {
    let tokens = TokenService::new(&config.jwt_secret)
        .context("EXPEDIENTES_JWT_SECRET must be set to a non-empty value")?;
    let tokens = Arc::new(tokens);

    let policy = ApiPolicy {
        enforce_permissions: config.enforce_api_permissions,
        redact_upstream: config.redact_upstream,
    };
    if !policy.enforce_permissions {
        warn!(target: "startup", "API permission checks disabled; only authentication is enforced");
    }
    let files: Arc<dyn FileStore> = Arc::new(LocalFileStore::new(&config.files_dir));

    match &config.database_url {
        Some(url) => {
            let pg = PgDataService::connect(url).await?;
            let data: Arc<dyn DataService> = Arc::new(
                GuardedDataService::new(pg)
                    .with_timeout(config.request_timeout)
                    .with_read_retries(config.read_retries),
            );
            let dir = Arc::new(ServiceDirectory::new(data.clone()));
            info!(target: "startup", "using PostgreSQL data service");
            Ok(AppState::new(dir.clone(), dir, data, files, tokens, policy))
        }
        None => {
            let data: Arc<dyn DataService> = Arc::new(
                GuardedDataService::new(MemoryDataService::new())
                    .with_timeout(config.request_timeout)
                    .with_read_retries(config.read_retries),
            );
            let dir = Arc::new(MemoryDirectory::with_dev_admin(&config.dev_admin_password, all_permissions())?);
            info!(target: "startup", "no database configured; using in-memory stores");
            Ok(AppState::new(dir.clone(), dir, data, files, tokens, policy))
        }
    }
}

/// Start the HTTP server on the configured port.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let state = build_state(&config).await?;
    info!(target: "startup", files_dir = %config.files_dir.display(), "attachments directory");
    let app = router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
