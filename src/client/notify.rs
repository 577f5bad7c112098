//! Uniform mapping of failed responses to user-facing notifications.

use serde::{Deserialize, Serialize};

/// A dismissible message with a short title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self { title: title.into(), message: message.into() }
    }
}

pub const TITLE_BAD_REQUEST: &str = "Solicitud inválida";
pub const TITLE_UNAUTHORIZED: &str = "No autorizado";
pub const TITLE_FORBIDDEN: &str = "Acceso denegado";
pub const TITLE_NOT_FOUND: &str = "No encontrado";
pub const TITLE_SERVER_ERROR: &str = "Error del servidor";
pub const TITLE_NETWORK: &str = "Sin conexión";

pub fn title_for_status(status: u16) -> &'static str {
    match status {
        400 => TITLE_BAD_REQUEST,
        401 => TITLE_UNAUTHORIZED,
        403 => TITLE_FORBIDDEN,
        404 => TITLE_NOT_FOUND,
        _ => TITLE_SERVER_ERROR,
    }
}

/// Build a notification from a status and the response body. The server's `message` field
/// wins; otherwise a generic text per status is used.
pub fn from_response(status: u16, body: &serde_json::Value) -> Notification {
    let message = body
        .get("message")
        .and_then(|m| m.as_str())
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_message(status).to_string());
    Notification::new(title_for_status(status), message)
}

fn default_message(status: u16) -> &'static str {
    match status {
        400 => "Los datos enviados no son válidos",
        401 => "Debe iniciar sesión nuevamente",
        403 => "No tiene permisos para esta acción",
        404 => "El recurso solicitado no existe",
        _ => "Ocurrió un error inesperado",
    }
}
