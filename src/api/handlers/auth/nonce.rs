use axum::{
    extract::Extension,
    http::{
        header::{CACHE_CONTROL, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, instrument};

use super::session::nonce_cookie;
use super::state::AuthConfig;
use super::storage::{self, NonceMetadata};
use super::types::NonceResponse;
use super::utils::{extract_client_ip, extract_user_agent, hash_token};
use crate::wallet::Nonce;

type NonceResult = Result<(StatusCode, HeaderMap, Json<NonceResponse>), (StatusCode, String)>;

#[utoipa::path(
    get,
    path= "/v1/auth/nonce",
    responses (
        (status = 200, description = "Freshly issued single-use nonce", body = NonceResponse),
        (status = 500, description = "Error issuing the nonce", body = String)
    ),
    tag = "auth",
)]
#[instrument(skip(pool, config, headers))]
pub async fn nonce(
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
    headers: HeaderMap,
) -> NonceResult {
    let nonce = Nonce::generate();

    // Only the hash lands in storage; the raw value goes back to the client
    // in the body and the session-binding cookie.
    let metadata = NonceMetadata {
        ip_address: extract_client_ip(&headers),
        user_agent: extract_user_agent(&headers),
    };

    storage::insert_nonce(
        &pool,
        &hash_token(nonce.as_str()),
        config.nonce_ttl_seconds(),
        &metadata,
    )
    .await
    .map_err(|err| {
        error!("Failed to persist nonce: {err:#}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to issue nonce".to_string(),
        )
    })?;

    let cookie = nonce_cookie(&config, nonce.as_str()).map_err(|err| {
        error!("Failed to build nonce cookie: {err}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to issue nonce".to_string(),
        )
    })?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response_headers.insert(SET_COOKIE, cookie);

    Ok((
        StatusCode::OK,
        response_headers,
        Json(NonceResponse {
            nonce: nonce.into_inner(),
        }),
    ))
}
