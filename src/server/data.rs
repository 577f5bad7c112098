use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;
use tracing::debug;

use super::auth::require;
use super::AppState;
use crate::datasvc::{Action, DataCommand, Entity, Params, Row};
use crate::error::{AppError, AppResult};
use crate::identity::RequestContext;

/// `POST /api/{entity}/{action}`: body is a JSON object of parameters (empty body means none).
pub async fn dispatch(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((entity, action)): Path<(String, String)>,
    body: Bytes,
) -> AppResult<Json<Vec<Row>>> {
    let entity = Entity::parse(&entity)
        .filter(Entity::is_dispatchable)
        .ok_or_else(|| AppError::not_found("unknown_entity", format!("Entidad desconocida: {}", entity)))?;
    let action = Action::parse(&action)
        .ok_or_else(|| AppError::user("unknown_action", format!("Acción desconocida: {}", action)))?;
    require(&state, &ctx, entity.permission())?;

    let params: Params = if body.iter().all(u8::is_ascii_whitespace) {
        Params::new()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::user("invalid_body", format!("Se esperaba un objeto JSON: {}", e)))?
    };
    debug!(
        target: "datasvc",
        user = %ctx.username(),
        request_id = %ctx.request_id,
        entity = %entity,
        action = %action,
        "dispatch"
    );
    let cmd = DataCommand::new(entity, action, params);
    let rows = state.data.execute(&cmd).await.map_err(|e| state.upstream(e))?;
    Ok(Json(rows))
}
