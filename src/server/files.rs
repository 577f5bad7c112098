use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use super::auth::require;
use super::AppState;
use crate::datasvc::Entity;
use crate::error::{AppError, AppResult};
use crate::filestore::{sanitize_name, unique_name};
use crate::identity::RequestContext;

fn file_not_found() -> AppError { AppError::not_found("file_not_found", "Archivo no encontrado") }

/// `POST /archivos/{nombre}`: raw body bytes, stored under a unique name.
pub async fn upload(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(nombre): Path<String>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<Value>)> {
    require(&state, &ctx, Entity::Expedientes.permission())?;
    if body.is_empty() {
        return Err(AppError::user("empty_file", "El archivo está vacío"));
    }
    let stored = unique_name(&nombre, Utc::now());
    let locator = state.files.put(&stored, &body).await.map_err(|e| state.upstream(e))?;
    Ok((StatusCode::CREATED, Json(json!({ "locator": locator }))))
}

/// `GET /archivos/{stored}`.
pub async fn download(
    State(state): State<AppState>,
    _ctx: RequestContext,
    Path(stored): Path<String>,
) -> AppResult<impl IntoResponse> {
    if stored.is_empty() || stored != sanitize_name(&stored) {
        return Err(file_not_found());
    }
    let bytes = state.files.get(&stored).await.map_err(|e| state.upstream(e))?.ok_or_else(file_not_found)?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes))
}
