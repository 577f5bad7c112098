#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use expedientes::datasvc::MemoryDataService;
use expedientes::directory::{AccountDirectory, MemoryDirectory, NewAccount, NewRole, RoleDirectory};
use expedientes::filestore::LocalFileStore;
use expedientes::identity::{AccountStatus, PermissionSet, TokenService};
use expedientes::security;
use expedientes::server::{all_permissions, router, ApiPolicy, AppState};

pub const SECRET: &str = "secreto-de-pruebas";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub tokens: Arc<TokenService>,
    pub tmp: TempDir,
}

async fn account(dir: &MemoryDirectory, user: &str, pass: &str, rol: &str, estado: AccountStatus) -> Result<()> {
    dir.insert_account(NewAccount {
        nombre_usuario: user.into(),
        nombres: user.to_uppercase(),
        apellidos: String::new(),
        email: format!("{user}@example.org"),
        contrasena: security::hash_password(pass)?,
        rol: rol.into(),
        estado,
        horario: None,
    })
    .await?;
    Ok(())
}

/// admin/admin123 (every permission), maria/correcta (Personas), pedro/correcta (inactive).
pub async fn app_with(policy: ApiPolicy) -> Result<TestApp> {
    let tmp = tempfile::tempdir()?;
    let dir = Arc::new(MemoryDirectory::new());
    dir.insert_role(NewRole { nombre: "Administrador".into(), permisos: all_permissions() }).await?;
    dir.insert_role(NewRole { nombre: "Digitador".into(), permisos: PermissionSet::single("Personas") }).await?;
    account(&dir, "admin", "admin123", "Administrador", AccountStatus::Active).await?;
    account(&dir, "maria", "correcta", "Digitador", AccountStatus::Active).await?;
    account(&dir, "pedro", "correcta", "Digitador", AccountStatus::Inactive).await?;

    let tokens = Arc::new(TokenService::new(SECRET)?);
    let state = AppState::new(
        dir.clone(),
        dir,
        Arc::new(MemoryDataService::new()),
        Arc::new(LocalFileStore::new(tmp.path().join("uploads"))),
        tokens.clone(),
        policy,
    );
    Ok(TestApp { router: router(state.clone()), state, tokens, tmp })
}

pub async fn app() -> Result<TestApp> { app_with(ApiPolicy::default()).await }

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Result<Request<Body>> {
    let mut b = Request::builder().method(method).uri(uri).header("content-type", "application/json");
    if let Some(t) = token {
        b = b.header("authorization", format!("Bearer {t}"));
    }
    Ok(b.body(Body::from(body.to_string()))?)
}

pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Result<Request<Body>> {
    let mut b = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        b = b.header("authorization", format!("Bearer {t}"));
    }
    Ok(b.body(Body::empty())?)
}

pub async fn send_raw(router: &Router, req: Request<Body>) -> Result<(StatusCode, Vec<u8>)> {
    let resp = router.clone().oneshot(req).await?;
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await?;
    Ok((status, bytes.to_vec()))
}

pub async fn send(router: &Router, req: Request<Body>) -> Result<(StatusCode, Value)> {
    let (status, bytes) = send_raw(router, req).await?;
    let v = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    Ok((status, v))
}

pub async fn login(router: &Router, user: &str, pass: &str) -> Result<String> {
    let body = serde_json::json!({"nombre_usuario": user, "contrasena": pass});
    let (status, v) = send(router, json_request("POST", "/login", None, &body)?).await?;
    anyhow::ensure!(status == StatusCode::OK, "login {user} failed: {status} {v}");
    Ok(v["token"].as_str().unwrap_or_default().to_string())
}
