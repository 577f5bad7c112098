//! Session endpoints over the in-process router: login outcomes and `/currentUser`.

mod common;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;

use common::{app, empty_request, json_request, login, send};
use expedientes::identity::TokenService;

async fn attempt(user: &str, pass: &str) -> Result<(StatusCode, serde_json::Value)> {
    let t = app().await?;
    let body = json!({"nombre_usuario": user, "contrasena": pass});
    send(&t.router, json_request("POST", "/login", None, &body)?).await
}

#[tokio::test]
async fn active_account_gets_token_for_its_username() -> Result<()> {
    let t = app().await?;
    let token = login(&t.router, "maria", "correcta").await?;
    let claims = t.tokens.validate(Some(&token))?;
    assert_eq!(claims.nombre_usuario, "maria");
    assert_eq!(claims.rol, "Digitador");
    assert!(claims.estado.is_active());
    assert!(claims.permisos.contains("Personas"));
    Ok(())
}

#[tokio::test]
async fn inactive_account_is_forbidden_with_admin_message() -> Result<()> {
    for pass in ["correcta", "incorrecta"] {
        let (status, v) = attempt("pedro", pass).await?;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(v["message"], "Usuario inactivo, contacte al administrador");
    }
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_unauthorized() -> Result<()> {
    let (status, v) = attempt("maria", "incorrecta").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(v["message"], "Contraseña Equivocada");
    assert_eq!(v["status"], "error");
    Ok(())
}

#[tokio::test]
async fn unknown_user_is_not_found() -> Result<()> {
    let (status, v) = attempt("ghost", "x").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(v["message"], "Usuario no encontrado");
    Ok(())
}

#[tokio::test]
async fn malformed_login_body_is_bad_request() -> Result<()> {
    let t = app().await?;
    let (status, v) = send(&t.router, json_request("POST", "/login", None, &json!({"usuario": "maria"}))?).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["code"], "invalid_body");
    Ok(())
}

#[tokio::test]
async fn current_user_without_header_is_unauthorized() -> Result<()> {
    let t = app().await?;
    let (status, v) = send(&t.router, empty_request("GET", "/currentUser", None)?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(v["message"], "Token de autorización no encontrado");
    Ok(())
}

#[tokio::test]
async fn current_user_reissues_same_claims() -> Result<()> {
    let t = app().await?;
    let token = login(&t.router, "maria", "correcta").await?;
    let (status, v) = send(&t.router, empty_request("GET", "/currentUser", Some(&token))?).await?;
    assert_eq!(status, StatusCode::OK);
    let fresh = v["token"].as_str().unwrap_or_default();
    assert_eq!(t.tokens.validate(Some(fresh))?, t.tokens.validate(Some(&token))?);
    Ok(())
}

#[tokio::test]
async fn expired_and_foreign_tokens_are_rejected() -> Result<()> {
    let t = app().await?;
    let token = login(&t.router, "maria", "correcta").await?;
    let claims = t.tokens.validate(Some(&token))?;

    let expired = t.tokens.issue_at(&claims, Utc::now() - Duration::hours(2))?;
    let (status, v) = send(&t.router, empty_request("GET", "/currentUser", Some(&expired))?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(v["code"], "invalid_token");

    let foreign = TokenService::new("otra-clave")?.issue(&claims)?;
    let (status, _) = send(&t.router, empty_request("GET", "/currentUser", Some(&foreign))?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn current_user_never_extends_the_session() -> Result<()> {
    let t = app().await?;
    let token = login(&t.router, "maria", "correcta").await?;
    let claims = t.tokens.validate(Some(&token))?;
    let issued = Utc::now() - Duration::minutes(59);
    let old = t.tokens.issue_at(&claims, issued)?;

    let (status, v) = send(&t.router, empty_request("GET", "/currentUser", Some(&old))?).await?;
    assert_eq!(status, StatusCode::OK);
    let renewed = v["token"].as_str().unwrap_or_default();
    let (back, exp) = t.tokens.validate_session(Some(renewed))?;
    assert_eq!(back, claims);
    assert!(exp <= issued + Duration::hours(1));
    Ok(())
}

#[tokio::test]
async fn deactivated_account_cannot_renew() -> Result<()> {
    let t = app().await?;
    let admin = login(&t.router, "admin", "admin123").await?;
    let token = login(&t.router, "maria", "correcta").await?;
    let id = t.tokens.validate(Some(&token))?.id;

    let (status, _) = send(&t.router, empty_request("DELETE", &format!("/usuarios/{id}"), Some(&admin))?).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, v) = send(&t.router, empty_request("GET", "/currentUser", Some(&token))?).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(v["code"], "inactive_account");
    Ok(())
}
