//! Signed, time-boxed session tokens (HS256 JWT).
//!
//! The token is the whole session: nothing is kept server-side, so validation is a pure
//! function of the token text, the secret and the clock.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::claims::Claims;
use crate::error::{AppError, MSG_INVALID_TOKEN, MSG_MISSING_TOKEN};

pub const DEFAULT_TTL_SECS: i64 = 60 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("no session token presented")]
    Unauthenticated,
    #[error("invalid session token: {0}")]
    InvalidToken(String),
    #[error("token signing secret is not configured")]
    MissingSecret,
    #[error("token signing failed: {0}")]
    Signing(String),
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Unauthenticated => AppError::unauthenticated("missing_token", MSG_MISSING_TOKEN),
            TokenError::InvalidToken(_) => AppError::invalid_token("invalid_token", MSG_INVALID_TOKEN),
            TokenError::MissingSecret | TokenError::Signing(_) => AppError::internal("token_signing", e.to_string().as_str()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenPayload {
    #[serde(flatten)]
    claims: Claims,
    iat: i64,
    exp: i64,
}

pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    /// An empty secret is a configuration error; callers abort startup on it.
    pub fn new(secret: &str) -> Result<Self, TokenError> {
        if secret.trim().is_empty() {
            return Err(TokenError::MissingSecret);
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl: Duration::seconds(DEFAULT_TTL_SECS),
        })
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration { self.ttl }

    pub fn issue(&self, claims: &Claims) -> Result<String, TokenError> {
        self.issue_at(claims, Utc::now())
    }

    pub fn issue_at(&self, claims: &Claims, issued_at: DateTime<Utc>) -> Result<String, TokenError> {
        self.issue_with_expiry(claims, issued_at, issued_at + self.ttl)
    }

    /// Sign `claims` with an explicit expiry. Re-issued sessions pass their original
    /// expiry here so that renewing never extends a session.
    pub fn issue_with_expiry(
        &self,
        claims: &Claims,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let payload = TokenPayload { claims: claims.clone(), iat: issued_at.timestamp(), exp: expires_at.timestamp() };
        encode(&Header::new(Algorithm::HS256), &payload, &self.encoding).map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// `None` or a blank token is `Unauthenticated`; bad signatures, malformed tokens and
    /// expired tokens are all `InvalidToken`.
    pub fn validate(&self, token: Option<&str>) -> Result<Claims, TokenError> {
        self.validate_session(token).map(|(claims, _)| claims)
    }

    /// Like [`validate`](Self::validate), also returning the token's expiry.
    pub fn validate_session(&self, token: Option<&str>) -> Result<(Claims, DateTime<Utc>), TokenError> {
        let token = match token.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return Err(TokenError::Unauthenticated),
        };
        match decode::<TokenPayload>(token, &self.decoding, &self.validation) {
            Ok(data) => {
                let exp = DateTime::<Utc>::from_timestamp(data.claims.exp, 0)
                    .ok_or_else(|| TokenError::InvalidToken("exp out of range".to_string()))?;
                Ok((data.claims.claims, exp))
            }
            Err(e) => {
                let reason = match e.kind() {
                    ErrorKind::ExpiredSignature => "expired".to_string(),
                    ErrorKind::InvalidSignature => "signature mismatch".to_string(),
                    other => format!("{:?}", other),
                };
                Err(TokenError::InvalidToken(reason))
            }
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let h = header?.trim();
    let (scheme, rest) = h.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") { return None; }
    let t = rest.trim();
    if t.is_empty() { None } else { Some(t) }
}
