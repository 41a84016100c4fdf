//! Session endpoints and cookie plumbing.

use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, AUTHORIZATION, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Json},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::state::AuthConfig;
use super::storage::{self, SessionRecord};
use super::types::{SessionResponse, SessionUser};
use super::utils::hash_token;

pub(super) const NONCE_COOKIE_NAME: &str = "firma_nonce";
pub(super) const SESSION_COOKIE_NAME: &str = "firma_session";

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 204, description = "No active session")
    ),
    tag = "auth",
)]
pub async fn session(headers: HeaderMap, pool: Extension<PgPool>) -> impl IntoResponse {
    // Missing cookies are treated as "no session" to avoid leaking auth state.
    let Some(token) = extract_session_token(&headers) else {
        return StatusCode::NO_CONTENT.into_response();
    };
    // Only the hash is stored; never compare raw tokens against the database.
    let token_hash = hash_token(&token);
    match storage::lookup_session(&pool, &token_hash).await {
        Ok(Some(record)) => (StatusCode::OK, Json(materialize(&record))).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!("Failed to lookup session: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth",
)]
pub async fn logout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    config: Extension<Arc<AuthConfig>>,
) -> impl IntoResponse {
    if let Some(token) = extract_session_token(&headers) {
        let token_hash = hash_token(&token);
        if let Err(err) = storage::delete_session(&pool, &token_hash).await {
            error!("Failed to delete session: {err:#}");
        }
    }

    // Always clear the cookie, even if the session record was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(&config) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

/// Turn a stored session record into the response object: the verified
/// identity nests under `user.id`, every other field passes through.
fn materialize(record: &SessionRecord) -> SessionResponse {
    SessionResponse {
        user: SessionUser {
            id: record.user_id.to_string(),
            address: record.address.clone(),
        },
        expires_at: record.expires_at.to_rfc3339(),
    }
}

/// Build a secure `HttpOnly` cookie carrying a freshly issued nonce.
pub(super) fn nonce_cookie(
    config: &AuthConfig,
    nonce: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(config, NONCE_COOKIE_NAME, nonce, config.nonce_ttl_seconds())
}

/// Build a secure `HttpOnly` cookie for the session token.
pub(super) fn session_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(
        config,
        SESSION_COOKIE_NAME,
        token,
        config.session_ttl_seconds(),
    )
}

fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(config, SESSION_COOKIE_NAME, "", 0)
}

fn build_cookie(
    config: &AuthConfig,
    name: &str,
    value: &str,
    max_age: i64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Pull a named cookie value out of the `Cookie` header.
pub(super) fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == name {
            return Some(val.to_string());
        }
    }
    None
}

fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    extract_cookie(headers, SESSION_COOKIE_NAME)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn config(frontend: &str) -> AuthConfig {
        AuthConfig::new(frontend.to_string())
    }

    #[test]
    fn materialize_nests_identity_under_user() -> Result<()> {
        let user_id = Uuid::now_v7();
        let expires_at = Utc
            .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
            .single()
            .context("valid timestamp")?;
        let record = SessionRecord {
            user_id,
            address: "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045".to_string(),
            expires_at,
        };

        let response = materialize(&record);
        assert_eq!(response.user.id, user_id.to_string());
        assert_eq!(
            response.user.address,
            "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045"
        );
        assert_eq!(response.expires_at, expires_at.to_rfc3339());
        Ok(())
    }

    #[test]
    fn session_cookie_marks_secure_on_https() -> Result<()> {
        let cookie = session_cookie(&config("https://app.firma.dev"), "token")?;
        let value = cookie.to_str()?;
        assert!(value.starts_with("firma_session=token; "));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Max-Age=43200"));
        assert!(value.ends_with("; Secure"));
        Ok(())
    }

    #[test]
    fn nonce_cookie_skips_secure_on_http() -> Result<()> {
        let cookie = nonce_cookie(&config("http://localhost:3000"), "aBcDeF1234")?;
        let value = cookie.to_str()?;
        assert!(value.starts_with("firma_nonce=aBcDeF1234; "));
        assert!(value.contains("Max-Age=300"));
        assert!(!value.contains("Secure"));
        Ok(())
    }

    #[test]
    fn clear_session_cookie_expires_immediately() -> Result<()> {
        let cookie = clear_session_cookie(&config("http://localhost:3000"))?;
        let value = cookie.to_str()?;
        assert!(value.starts_with("firma_session=; "));
        assert!(value.contains("Max-Age=0"));
        Ok(())
    }

    #[test]
    fn extract_cookie_finds_named_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("other=1; firma_nonce=aBcDeF1234; firma_session=tok"),
        );
        assert_eq!(
            extract_cookie(&headers, NONCE_COOKIE_NAME),
            Some("aBcDeF1234".to_string())
        );
        assert_eq!(
            extract_cookie(&headers, SESSION_COOKIE_NAME),
            Some("tok".to_string())
        );
        assert_eq!(extract_cookie(&headers, "missing"), None);
    }

    #[test]
    fn extract_session_token_prefers_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(COOKIE, HeaderValue::from_static("firma_session=cookie"));
        assert_eq!(extract_session_token(&headers), Some("abc".to_string()));
    }

    #[test]
    fn extract_session_token_ignores_empty_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_session_token(&headers), None);
    }
}
