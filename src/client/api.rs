//! HTTP access to the session endpoints.
//!
//! Every request goes through [`HttpAuthApi::request`], which attaches the bearer token and
//! turns any non-success status into a [`Notification`].

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Method, Url};
use serde_json::Value;
use thiserror::Error;

use super::notify::{self, Notification, TITLE_NETWORK, TITLE_SERVER_ERROR};
use crate::identity::{LoginRequest, LoginResponse};

/// A failed call. `status` is `None` when no response arrived (network failure).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {}", .notification.title, .notification.message)]
pub struct ApiFailure {
    pub status: Option<u16>,
    pub notification: Notification,
}

impl ApiFailure {
    pub fn from_status(status: u16, body: &Value) -> Self {
        Self { status: Some(status), notification: notify::from_response(status, body) }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self { status: None, notification: Notification::new(TITLE_NETWORK, message) }
    }

    /// A success status whose body could not be read. Not a rejection: the session stays.
    pub fn unreadable(detail: impl std::fmt::Display) -> Self {
        Self {
            status: None,
            notification: Notification::new(TITLE_SERVER_ERROR, format!("Respuesta ilegible del servidor: {}", detail)),
        }
    }

    /// The server answered and refused the request.
    pub fn is_rejection(&self) -> bool { self.status.is_some() }
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, req: &LoginRequest) -> Result<LoginResponse, ApiFailure>;
    /// Re-validate `token` against the server; a re-signed token with the same expiry comes back on success.
    async fn current_user(&self, token: &str) -> Result<LoginResponse, ApiFailure>;
    /// Token to attach to later requests; `None` after sign-out.
    fn set_token(&self, _token: Option<&str>) {}
}

pub struct HttpAuthApi {
    base: Url,
    client: reqwest::Client,
    token: RwLock<Option<String>>,
}

impl HttpAuthApi {
    pub fn new(base: &str) -> anyhow::Result<Self> {
        let base = Url::parse(base)?;
        let client = reqwest::Client::builder().build()?;
        Ok(Self { base, client, token: RwLock::new(None) })
    }

    pub async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value, ApiFailure> {
        let token = self.token.read().clone();
        self.request_with(method, path, body, token.as_deref()).await
    }

    async fn request_with(&self, method: Method, path: &str, body: Option<&Value>, token: Option<&str>) -> Result<Value, ApiFailure> {
        let url = self.base.join(path).map_err(|e| ApiFailure::network(e.to_string()))?;
        let mut rb = self.client.request(method, url);
        if let Some(t) = token {
            let hv = HeaderValue::from_str(&format!("Bearer {}", t)).map_err(|e| ApiFailure::network(e.to_string()))?;
            rb = rb.header(AUTHORIZATION, hv);
        }
        if let Some(b) = body {
            rb = rb.json(b);
        }
        let resp = rb.send().await.map_err(|e| ApiFailure::network(e.to_string()))?;
        let status = resp.status();
        let bytes = resp.bytes().await.map_err(|e| ApiFailure::network(e.to_string()))?;
        read_body(status.as_u16(), &bytes)
    }

    fn parse_login(val: Value) -> Result<LoginResponse, ApiFailure> {
        serde_json::from_value(val).map_err(|e| ApiFailure::network(format!("unexpected response: {}", e)))
    }

    /// Run a data-service command for `entity`/`action` and return the rows.
    pub async fn data(&self, entity: &str, action: &str, params: &Value) -> Result<Vec<Value>, ApiFailure> {
        let val = self.request(Method::POST, &format!("/api/{}/{}", entity, action), Some(params)).await?;
        match val {
            Value::Array(rows) => Ok(rows),
            other => Ok(vec![other]),
        }
    }
}

/// Interpret a response body. Error bodies that are not JSON still map to a notification
/// by status; an unreadable success body is a failure of its own.
fn read_body(status: u16, bytes: &[u8]) -> Result<Value, ApiFailure> {
    let parsed = if bytes.is_empty() { Ok(Value::Null) } else { serde_json::from_slice::<Value>(bytes) };
    if !(200..300).contains(&status) {
        return Err(ApiFailure::from_status(status, &parsed.unwrap_or(Value::Null)));
    }
    parsed.map_err(ApiFailure::unreadable)
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, req: &LoginRequest) -> Result<LoginResponse, ApiFailure> {
        let body = serde_json::to_value(req).map_err(|e| ApiFailure::network(e.to_string()))?;
        let val = self.request(Method::POST, "/login", Some(&body)).await?;
        Self::parse_login(val)
    }

    async fn current_user(&self, token: &str) -> Result<LoginResponse, ApiFailure> {
        let val = self.request_with(Method::GET, "/currentUser", None, Some(token)).await?;
        Self::parse_login(val)
    }

    fn set_token(&self, token: Option<&str>) {
        *self.token.write() = token.map(str::to_string);
    }
}
