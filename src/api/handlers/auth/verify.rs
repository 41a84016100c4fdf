//! Credential verification: the core of the sign-in flow.

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, instrument, warn};

use super::session::{extract_cookie, session_cookie, NONCE_COOKIE_NAME};
use super::state::AuthConfig;
use super::storage;
use super::types::{VerifyRequest, VerifyResponse};
use super::utils::hash_token;
use crate::wallet::{self, VerifyError};

#[utoipa::path(
    post,
    path= "/v1/auth/verify",
    request_body = VerifyRequest,
    responses (
        (status = 200, description = "Credential accepted, session issued", body = VerifyResponse),
        (status = 401, description = "Credential denied"),
    ),
    tag = "auth",
)]
#[instrument(skip(pool, config, headers, payload))]
pub async fn verify(
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
    headers: HeaderMap,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(request)) = payload else {
        warn!("Credential denied: request body is not a credential object");
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let session_nonce = extract_cookie(&headers, NONCE_COOKIE_NAME);

    let credential = match wallet::verify_credential(
        &request.message,
        &request.signature,
        session_nonce.as_deref(),
        config.domain(),
    ) {
        Ok(credential) => credential,
        Err(err) => return deny(&err),
    };

    // The nonce cookie matched; now burn the stored nonce so the same
    // message never verifies twice.
    match storage::consume_nonce(&pool, &hash_token(&credential.nonce)).await {
        Ok(true) => {}
        Ok(false) => return deny(&VerifyError::MissingNonce),
        Err(err) => return deny(&VerifyError::Storage(err)),
    }

    let user_id = match storage::find_or_create_account(&pool, &credential.address).await {
        Ok(user_id) => user_id,
        Err(err) => return deny(&VerifyError::Storage(err)),
    };

    let token = match storage::insert_session(&pool, user_id, config.session_ttl_seconds()).await {
        Ok(token) => token,
        Err(err) => return deny(&VerifyError::Storage(err)),
    };

    let mut response_headers = HeaderMap::new();
    match session_cookie(&config, &token) {
        Ok(cookie) => {
            response_headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    (
        StatusCode::OK,
        response_headers,
        Json(VerifyResponse {
            id: user_id.to_string(),
        }),
    )
        .into_response()
}

// Uniform denial: no session, no structured error body. Cause goes to the
// logs and nowhere else.
fn deny(err: &VerifyError) -> Response {
    match err {
        VerifyError::Storage(source) => error!("Credential denied: {err}: {source:#}"),
        _ => warn!("Credential denied: {err}"),
    }
    StatusCode::UNAUTHORIZED.into_response()
}
