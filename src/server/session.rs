use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use super::{json_body, AppState};
use crate::error::AppResult;
use crate::identity::{LoginRequest, LoginResponse, RequestContext};

/// `POST /login`: 404 unknown user, 403 inactive account, 401 wrong password.
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<LoginResponse>> {
    let req = json_body(body)?;
    let resp = state.auth.login(&req).await.map_err(|e| state.surface(e))?;
    Ok(Json(resp))
}

/// `GET /currentUser`: a re-signed token with the same claims and the same expiry.
/// Rejected with 401 when the `Authorization` header is missing or the token does not
/// verify, and with 403 once the account has been deactivated.
pub async fn current_user(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Json<LoginResponse>> {
    let resp = state.auth.reissue(&ctx.claims, ctx.expires_at).await.map_err(|e| state.surface(e))?;
    Ok(Json(resp))
}
