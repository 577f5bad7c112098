//! Unified application error model and mapping helpers.
//! Every handler failure ends up as one of these variants; the HTTP status and the
//! user-facing message travel with it so the client can show a notification.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub const MSG_USER_NOT_FOUND: &str = "Usuario no encontrado";
pub const MSG_INACTIVE_ACCOUNT: &str = "Usuario inactivo, contacte al administrador";
pub const MSG_WRONG_PASSWORD: &str = "Contraseña Equivocada";
pub const MSG_MISSING_TOKEN: &str = "Token de autorización no encontrado";
pub const MSG_INVALID_TOKEN: &str = "Token inválido o expirado";
pub const MSG_FORBIDDEN: &str = "No tiene permisos para realizar esta acción";
pub const MSG_TIMEOUT: &str = "La operación excedió el tiempo de espera";
pub const MSG_UPSTREAM_REDACTED: &str = "Error interno del servidor";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    NotFound { code: String, message: String },
    InactiveAccount { code: String, message: String },
    InvalidCredentials { code: String, message: String },
    Unauthenticated { code: String, message: String },
    InvalidToken { code: String, message: String },
    Forbidden { code: String, message: String },
    Timeout { code: String, message: String },
    Upstream { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::InactiveAccount { code, .. }
            | AppError::InvalidCredentials { code, .. }
            | AppError::Unauthenticated { code, .. }
            | AppError::InvalidToken { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::Timeout { code, .. }
            | AppError::Upstream { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::InactiveAccount { message, .. }
            | AppError::InvalidCredentials { message, .. }
            | AppError::Unauthenticated { message, .. }
            | AppError::InvalidToken { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::Timeout { message, .. }
            | AppError::Upstream { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn not_found(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn inactive(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::InactiveAccount { code: code.into(), message: msg.into() } }
    pub fn credentials(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::InvalidCredentials { code: code.into(), message: msg.into() } }
    pub fn unauthenticated(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Unauthenticated { code: code.into(), message: msg.into() } }
    pub fn invalid_token(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::InvalidToken { code: code.into(), message: msg.into() } }
    pub fn forbidden(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Forbidden { code: code.into(), message: msg.into() } }
    pub fn timeout(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Timeout { code: code.into(), message: msg.into() } }
    pub fn upstream(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Upstream { code: code.into(), message: msg.into() } }
    pub fn internal(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::InactiveAccount { .. } => 403,
            AppError::InvalidCredentials { .. } => 401,
            AppError::Unauthenticated { .. } => 401,
            AppError::InvalidToken { .. } => 401,
            AppError::Forbidden { .. } => 403,
            AppError::Timeout { .. } => 504,
            AppError::Upstream { .. } => 500,
            AppError::Internal { .. } => 500,
        }
    }

    /// Replace upstream detail with a generic message. Other kinds pass through.
    pub fn redacted(self) -> Self {
        match self {
            AppError::Upstream { code, .. } => AppError::Upstream { code, message: MSG_UPSTREAM_REDACTED.into() },
            other => other,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Collaborators may raise a typed AppError (e.g. timeouts) through anyhow
        if let Some(app) = err.downcast_ref::<AppError>() {
            return app.clone();
        }
        AppError::Upstream { code: "upstream_error".into(), message: err.to_string() }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = serde_json::json!({
            "status": "error",
            "code": self.code_str(),
            "message": self.message(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::user("bad_input", "oops").http_status(), 400);
        assert_eq!(AppError::not_found("not_found", "missing").http_status(), 404);
        assert_eq!(AppError::inactive("inactive", "off").http_status(), 403);
        assert_eq!(AppError::credentials("bad_password", "no").http_status(), 401);
        assert_eq!(AppError::unauthenticated("no_token", "no").http_status(), 401);
        assert_eq!(AppError::invalid_token("bad_token", "no").http_status(), 401);
        assert_eq!(AppError::forbidden("forbidden", "no").http_status(), 403);
        assert_eq!(AppError::timeout("timeout", "slow").http_status(), 504);
        assert_eq!(AppError::upstream("db", "boom").http_status(), 500);
        assert_eq!(AppError::internal("internal", "panic").http_status(), 500);
    }

    #[test]
    fn anyhow_keeps_typed_errors() {
        let err = anyhow::Error::new(AppError::timeout("timeout", MSG_TIMEOUT));
        let app: AppError = err.into();
        assert_eq!(app.http_status(), 504);

        let app: AppError = anyhow::anyhow!("relation \"sp_pagos\" does not exist").into();
        assert_eq!(app.code_str(), "upstream_error");
        assert!(app.message().contains("sp_pagos"));
    }

    #[test]
    fn redaction_only_touches_upstream() {
        let up = AppError::upstream("upstream_error", "password authentication failed for user x").redacted();
        assert_eq!(up.message(), MSG_UPSTREAM_REDACTED);
        let nf = AppError::not_found("not_found", MSG_USER_NOT_FOUND).redacted();
        assert_eq!(nf.message(), MSG_USER_NOT_FOUND);
    }
}
