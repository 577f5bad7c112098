use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::claims::{Claims, PermissionSet};
use super::token::TokenService;
use crate::directory::{AccountDirectory, RoleDirectory};
use crate::error::{AppError, AppResult, MSG_INACTIVE_ACCOUNT, MSG_USER_NOT_FOUND, MSG_WRONG_PASSWORD};
use crate::security;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub nombre_usuario: String,
    pub contrasena: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn login(&self, req: &LoginRequest) -> AppResult<LoginResponse>;
    /// Re-sign an already validated session with the same claims. The new token expires
    /// at `expires_at`, never later, and accounts deactivated since login are refused.
    async fn reissue(&self, claims: &Claims, expires_at: DateTime<Utc>) -> AppResult<LoginResponse>;
}

/// Login against the account and role directories.
///
/// Order matters: unknown user, then account status, then password. An inactive account
/// reports `InactiveAccount` whatever password was supplied.
pub struct DirectoryAuthProvider {
    accounts: Arc<dyn AccountDirectory>,
    roles: Arc<dyn RoleDirectory>,
    tokens: Arc<TokenService>,
}

impl DirectoryAuthProvider {
    pub fn new(accounts: Arc<dyn AccountDirectory>, roles: Arc<dyn RoleDirectory>, tokens: Arc<TokenService>) -> Self {
        Self { accounts, roles, tokens }
    }
}

#[async_trait]
impl AuthProvider for DirectoryAuthProvider {
    async fn login(&self, req: &LoginRequest) -> AppResult<LoginResponse> {
        let Some(account) = self.accounts.account_by_username(&req.nombre_usuario).await? else {
            info!(target: "auth", user = %req.nombre_usuario, outcome = "not_found", "login rejected");
            return Err(AppError::not_found("user_not_found", MSG_USER_NOT_FOUND));
        };
        if !account.estado.is_active() {
            info!(target: "auth", user = %req.nombre_usuario, outcome = "inactive", "login rejected");
            return Err(AppError::inactive("inactive_account", MSG_INACTIVE_ACCOUNT));
        }
        if !security::verify_password(&account.contrasena, &req.contrasena) {
            info!(target: "auth", user = %req.nombre_usuario, outcome = "bad_password", "login rejected");
            return Err(AppError::credentials("invalid_credentials", MSG_WRONG_PASSWORD));
        }
        let permisos = match self.roles.role_by_name(&account.rol).await? {
            Some(role) => role.permisos,
            None => {
                warn!(target: "auth", user = %account.nombre_usuario, rol = %account.rol, "role not found; issuing token without permissions");
                PermissionSet::new()
            }
        };
        let token = self.tokens.issue(&account.claims(permisos))?;
        info!(target: "auth", user = %account.nombre_usuario, rol = %account.rol, outcome = "ok", "login");
        Ok(LoginResponse { token })
    }

    async fn reissue(&self, claims: &Claims, expires_at: DateTime<Utc>) -> AppResult<LoginResponse> {
        let Some(account) = self.accounts.account_by_id(claims.id).await? else {
            info!(target: "auth", user = %claims.nombre_usuario, outcome = "not_found", "session renewal rejected");
            return Err(AppError::not_found("user_not_found", MSG_USER_NOT_FOUND));
        };
        if !account.estado.is_active() {
            info!(target: "auth", user = %claims.nombre_usuario, outcome = "inactive", "session renewal rejected");
            return Err(AppError::inactive("inactive_account", MSG_INACTIVE_ACCOUNT));
        }
        let token = self.tokens.issue_with_expiry(claims, Utc::now(), expires_at)?;
        Ok(LoginResponse { token })
    }
}
