//! Account and role administration. Accounts are never hard-deleted; `DELETE` deactivates.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::auth::require;
use super::{json_body, path_id, AppState};
use crate::datasvc::Entity;
use crate::directory::{AccountUpdate, AccountView, NewAccount, NewRole, Role};
use crate::error::{AppError, AppResult, MSG_USER_NOT_FOUND, MSG_WRONG_PASSWORD};
use crate::identity::{AccountStatus, RequestContext, TimeWindow};
use crate::security;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub nombre_usuario: String,
    #[serde(default)]
    pub nombres: String,
    #[serde(default)]
    pub apellidos: String,
    #[serde(default)]
    pub email: String,
    pub contrasena: String,
    pub rol: String,
    #[serde(default)]
    pub estado: Option<AccountStatus>,
    #[serde(default)]
    pub horario: Option<TimeWindow>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminUpdateRequest {
    pub nombres: Option<String>,
    pub apellidos: Option<String>,
    pub email: Option<String>,
    pub rol: Option<String>,
    pub estado: Option<AccountStatus>,
    pub horario: Option<TimeWindow>,
    /// Plaintext; hashed before it reaches the directory.
    pub contrasena: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub contrasena_actual: String,
    pub contrasena_nueva: String,
}

async fn hash(password: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || security::hash_password(&password))
        .await
        .map_err(|e| AppError::internal("hash_task", e.to_string().as_str()))?
        .map_err(|e| AppError::internal("hash_failed", e.to_string().as_str()))
}

fn not_found_account() -> AppError { AppError::not_found("user_not_found", MSG_USER_NOT_FOUND) }

fn not_found_role() -> AppError { AppError::not_found("role_not_found", "Rol no encontrado") }

/// Accounts may only be assigned roles the directory knows; otherwise they would log in
/// with no permissions at all.
async fn ensure_role_exists(state: &AppState, rol: &str) -> AppResult<()> {
    match state.roles.role_by_name(rol).await.map_err(|e| state.upstream(e))? {
        Some(_) => Ok(()),
        None => Err(AppError::user("unknown_role", "El rol no existe")),
    }
}

pub async fn list_accounts(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Json<Vec<AccountView>>> {
    require(&state, &ctx, Entity::Usuarios.permission())?;
    let rows = state.accounts.list_accounts().await.map_err(|e| state.upstream(e))?;
    Ok(Json(rows.iter().map(|a| a.view()).collect()))
}

pub async fn register_account(
    State(state): State<AppState>,
    ctx: RequestContext,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<AccountView>)> {
    require(&state, &ctx, Entity::Usuarios.permission())?;
    let req = json_body(body)?;
    let nombre_usuario = req.nombre_usuario.trim().to_string();
    if nombre_usuario.is_empty() || req.contrasena.is_empty() || req.rol.trim().is_empty() {
        return Err(AppError::user("missing_fields", "Usuario, contraseña y rol son obligatorios"));
    }
    if state.accounts.account_by_username(&nombre_usuario).await.map_err(|e| state.upstream(e))?.is_some() {
        return Err(AppError::user("username_taken", "El nombre de usuario ya existe"));
    }
    let rol = req.rol.trim().to_string();
    ensure_role_exists(&state, &rol).await?;
    let digest = hash(req.contrasena).await?;
    let account = state
        .accounts
        .insert_account(NewAccount {
            nombre_usuario,
            nombres: req.nombres,
            apellidos: req.apellidos,
            email: req.email,
            contrasena: digest,
            rol,
            estado: req.estado.unwrap_or(AccountStatus::Active),
            horario: req.horario,
        })
        .await
        .map_err(|e| state.upstream(e))?;
    info!(target: "auth", admin = %ctx.username(), user = %account.nombre_usuario, rol = %account.rol, "account registered");
    Ok((StatusCode::CREATED, Json(account.view())))
}

pub async fn update_account(
    State(state): State<AppState>,
    ctx: RequestContext,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<AdminUpdateRequest>, JsonRejection>,
) -> AppResult<Json<AccountView>> {
    require(&state, &ctx, Entity::Usuarios.permission())?;
    let id = path_id(id)?;
    let req = json_body(body)?;
    let rol = match req.rol {
        Some(r) => {
            let r = r.trim().to_string();
            ensure_role_exists(&state, &r).await?;
            Some(r)
        }
        None => None,
    };
    let contrasena = match req.contrasena {
        Some(p) if !p.is_empty() => Some(hash(p).await?),
        _ => None,
    };
    let update = AccountUpdate {
        nombres: req.nombres,
        apellidos: req.apellidos,
        email: req.email,
        rol,
        estado: req.estado,
        horario: req.horario,
        contrasena,
    };
    let account = state
        .accounts
        .update_account(id, update)
        .await
        .map_err(|e| state.upstream(e))?
        .ok_or_else(not_found_account)?;
    info!(target: "auth", admin = %ctx.username(), user = %account.nombre_usuario, "account updated");
    Ok(Json(account.view()))
}

/// Self-service password change; only needs a session.
pub async fn change_own_password(
    State(state): State<AppState>,
    ctx: RequestContext,
    body: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let req = json_body(body)?;
    if req.contrasena_nueva.is_empty() {
        return Err(AppError::user("missing_fields", "La nueva contraseña es obligatoria"));
    }
    let account = state
        .accounts
        .account_by_id(ctx.claims.id)
        .await
        .map_err(|e| state.upstream(e))?
        .ok_or_else(not_found_account)?;
    if !security::verify_password(&account.contrasena, &req.contrasena_actual) {
        return Err(AppError::credentials("invalid_credentials", MSG_WRONG_PASSWORD));
    }
    let digest = hash(req.contrasena_nueva).await?;
    let update = AccountUpdate { contrasena: Some(digest), ..AccountUpdate::default() };
    state
        .accounts
        .update_account(account.id, update)
        .await
        .map_err(|e| state.upstream(e))?
        .ok_or_else(not_found_account)?;
    info!(target: "auth", user = %account.nombre_usuario, "password changed");
    Ok(Json(json!({"status": "ok"})))
}

pub async fn deactivate_account(
    State(state): State<AppState>,
    ctx: RequestContext,
    id: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<AccountView>> {
    require(&state, &ctx, Entity::Usuarios.permission())?;
    let id = path_id(id)?;
    let update = AccountUpdate { estado: Some(AccountStatus::Inactive), ..AccountUpdate::default() };
    let account = state
        .accounts
        .update_account(id, update)
        .await
        .map_err(|e| state.upstream(e))?
        .ok_or_else(not_found_account)?;
    info!(target: "auth", admin = %ctx.username(), user = %account.nombre_usuario, "account deactivated");
    Ok(Json(account.view()))
}

pub async fn list_roles(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Json<Vec<Role>>> {
    require(&state, &ctx, Entity::Roles.permission())?;
    Ok(Json(state.roles.list_roles().await.map_err(|e| state.upstream(e))?))
}

fn validate_role(new: &mut NewRole) -> AppResult<()> {
    new.nombre = new.nombre.trim().to_string();
    if new.nombre.is_empty() {
        return Err(AppError::user("missing_fields", "El nombre del rol es obligatorio"));
    }
    Ok(())
}

pub async fn create_role(
    State(state): State<AppState>,
    ctx: RequestContext,
    body: Result<Json<NewRole>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Role>)> {
    require(&state, &ctx, Entity::Roles.permission())?;
    let mut new = json_body(body)?;
    validate_role(&mut new)?;
    if state.roles.role_by_name(&new.nombre).await.map_err(|e| state.upstream(e))?.is_some() {
        return Err(AppError::user("role_exists", "El rol ya existe"));
    }
    let role = state.roles.insert_role(new).await.map_err(|e| state.upstream(e))?;
    info!(target: "auth", admin = %ctx.username(), rol = %role.nombre, permisos = role.permisos.len(), "role created");
    Ok((StatusCode::CREATED, Json(role)))
}

pub async fn update_role(
    State(state): State<AppState>,
    ctx: RequestContext,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<NewRole>, JsonRejection>,
) -> AppResult<Json<Role>> {
    require(&state, &ctx, Entity::Roles.permission())?;
    let id = path_id(id)?;
    let mut new = json_body(body)?;
    validate_role(&mut new)?;
    if let Some(existing) = state.roles.role_by_name(&new.nombre).await.map_err(|e| state.upstream(e))? {
        if existing.id != id {
            return Err(AppError::user("role_exists", "El rol ya existe"));
        }
    }
    let role = state
        .roles
        .update_role(id, new)
        .await
        .map_err(|e| state.upstream(e))?
        .ok_or_else(not_found_role)?;
    info!(target: "auth", admin = %ctx.username(), rol = %role.nombre, "role updated");
    Ok(Json(role))
}

pub async fn delete_role(
    State(state): State<AppState>,
    ctx: RequestContext,
    id: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<Value>> {
    require(&state, &ctx, Entity::Roles.permission())?;
    let id = path_id(id)?;
    if !state.roles.delete_role(id).await.map_err(|e| state.upstream(e))? {
        return Err(not_found_role());
    }
    info!(target: "auth", admin = %ctx.username(), role_id = id, "role deleted");
    Ok(Json(json!({"status": "ok"})))
}
