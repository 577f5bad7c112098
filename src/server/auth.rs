//! Bearer-token extraction and the server-side permission gate.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tracing::{debug, warn};

use super::AppState;
use crate::error::{AppError, AppResult, MSG_FORBIDDEN};
use crate::identity::{bearer_token, RequestContext};

impl FromRequestParts<AppState> for RequestContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        match state.tokens.validate_session(bearer_token(header)) {
            Ok((claims, expires_at)) => Ok(RequestContext::new(claims, expires_at)),
            Err(e) => {
                debug!(target: "auth", path = %parts.uri.path(), reason = %e, "request not authenticated");
                Err(e.into())
            }
        }
    }
}

/// Require `permission` for this request, unless API permission checks are switched off.
pub fn require(state: &AppState, ctx: &RequestContext, permission: &str) -> AppResult<()> {
    if !state.policy.enforce_permissions || ctx.check(permission).is_allowed() {
        return Ok(());
    }
    warn!(
        target: "auth",
        user = %ctx.username(),
        request_id = %ctx.request_id,
        permission = permission,
        "permission denied"
    );
    Err(AppError::forbidden("forbidden", MSG_FORBIDDEN))
}
