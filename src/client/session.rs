//! Client session store: an explicit context object instead of ambient globals, so each
//! test (or each window) gets its own.
//!
//! Lifecycle: `init` (nothing loaded) -> `restore` (optimistic, from storage) ->
//! `revalidate` (server check) -> `sign_out` / `clear`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, warn};

use super::api::{ApiFailure, AuthApi};
use super::storage::TokenStorage;
use crate::identity::{Claims, LoginRequest};

/// Public route shown after sign-out.
pub const LANDING_PATH: &str = "/";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub user: Option<Claims>,
    pub is_authenticated: bool,
}

#[derive(Deserialize)]
struct Payload {
    #[serde(flatten)]
    claims: Claims,
    #[serde(default)]
    exp: Option<i64>,
}

/// Read the claims of a token without checking its signature. The server stays the only
/// judge of validity; this just fills the UI until revalidation answers.
pub fn decode_claims(token: &str) -> Option<Claims> {
    let payload = decode_payload(token)?;
    Some(payload.claims)
}

fn decode_payload(token: &str) -> Option<Payload> {
    let mut parts = token.split('.');
    let (_header, body) = (parts.next()?, parts.next()?);
    parts.next()?;
    let bytes = URL_SAFE_NO_PAD.decode(body.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

pub struct SessionContext<A, S> {
    api: A,
    storage: S,
    state: RwLock<SessionState>,
    token: RwLock<Option<String>>,
}

impl<A: AuthApi, S: TokenStorage> SessionContext<A, S> {
    pub fn init(api: A, storage: S) -> Self {
        Self { api, storage, state: RwLock::new(SessionState::default()), token: RwLock::new(None) }
    }

    pub fn state(&self) -> SessionState { self.state.read().clone() }

    pub fn token(&self) -> Option<String> { self.token.read().clone() }

    pub fn claims(&self) -> Option<Claims> { self.state.read().user.clone() }

    pub fn api(&self) -> &A { &self.api }

    fn adopt(&self, token: String, claims: Claims) {
        self.api.set_token(Some(token.as_str()));
        *self.token.write() = Some(token);
        *self.state.write() = SessionState { user: Some(claims), is_authenticated: true };
    }

    /// Load the persisted token and mark the session authenticated without asking the
    /// server. Returns whether a session was restored.
    pub fn restore(&self) -> bool {
        let stored = match self.storage.load() {
            Ok(t) => t,
            Err(e) => {
                warn!(target: "client", error = %e, "could not read stored token");
                None
            }
        };
        let Some(token) = stored else { return false };
        match decode_payload(&token) {
            Some(p) if p.exp.map_or(true, |exp| exp > Utc::now().timestamp()) => {
                self.adopt(token, p.claims);
                true
            }
            _ => {
                debug!(target: "client", "stored token unreadable or expired; clearing");
                self.clear();
                false
            }
        }
    }

    /// Ask the server whether the current token is still good. A refusal clears the
    /// session; a network failure leaves the optimistic state in place.
    pub async fn revalidate(&self) -> bool {
        let Some(token) = self.token() else { return false };
        match self.api.current_user(&token).await {
            Ok(resp) => match decode_claims(&resp.token) {
                Some(claims) => {
                    if let Err(e) = self.storage.store(&resp.token) {
                        warn!(target: "client", error = %e, "could not persist refreshed token");
                    }
                    self.adopt(resp.token, claims);
                    true
                }
                None => {
                    self.clear();
                    false
                }
            },
            Err(f) if f.is_rejection() => {
                debug!(target: "client", status = ?f.status, "session rejected by server");
                self.clear();
                false
            }
            Err(f) => {
                warn!(target: "client", message = %f.notification.message, "could not revalidate session");
                self.state.read().is_authenticated
            }
        }
    }

    /// `restore` followed by `revalidate`: the start-up sequence.
    pub async fn restore_session(&self) -> bool {
        if !self.restore() {
            return false;
        }
        self.revalidate().await
    }

    pub async fn sign_in(&self, nombre_usuario: &str, contrasena: &str) -> Result<Claims, ApiFailure> {
        let req = LoginRequest { nombre_usuario: nombre_usuario.to_string(), contrasena: contrasena.to_string() };
        let resp = self.api.login(&req).await?;
        let claims = decode_claims(&resp.token).ok_or_else(|| ApiFailure::network("respuesta de inicio de sesión ilegible"))?;
        self.storage.store(&resp.token).map_err(|e| ApiFailure::network(e.to_string()))?;
        self.adopt(resp.token, claims.clone());
        Ok(claims)
    }

    /// Clear everything and return the path to navigate to.
    pub fn sign_out(&self) -> &'static str {
        self.clear();
        LANDING_PATH
    }

    pub fn clear(&self) {
        if let Err(e) = self.storage.remove() {
            warn!(target: "client", error = %e, "could not remove stored token");
        }
        self.api.set_token(None);
        *self.token.write() = None;
        *self.state.write() = SessionState::default();
    }
}
