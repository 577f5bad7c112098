use chrono::{DateTime, Utc};

use super::authorizer::{authorize, Decision};
use super::claims::{Claims, PermissionSet};

/// Per-request identity: the validated claims, when the presented token runs out, and a
/// request id for log correlation.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub claims: Claims,
    pub expires_at: DateTime<Utc>,
    pub request_id: String,
}

impl RequestContext {
    pub fn new(claims: Claims, expires_at: DateTime<Utc>) -> Self {
        Self { claims, expires_at, request_id: uuid::Uuid::new_v4().to_string() }
    }

    pub fn username(&self) -> &str { &self.claims.nombre_usuario }

    pub fn check(&self, permission: &str) -> Decision {
        authorize(&self.claims, Some(&PermissionSet::single(permission)))
    }
}
