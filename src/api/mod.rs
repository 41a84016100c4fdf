use crate::api::handlers::{auth, health};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method, Request},
    routing::{get, post},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer, request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{debug_span, info, Span};
use ulid::Ulid;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;

use handlers::auth::state::AuthConfig;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::live,
        health::ready,
        health::health,
        auth::nonce::nonce,
        auth::verify::verify,
        auth::session::session,
        auth::session::logout,
    ),
    components(schemas(
        health::Health,
        auth::types::NonceResponse,
        auth::types::VerifyRequest,
        auth::types::VerifyResponse,
        auth::types::SessionResponse,
        auth::types::SessionUser,
    )),
    tags(
        (name = "auth", description = "Sign-In with Ethereum credential API"),
        (name = "health", description = "Service probes"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Build the router and serve it.
/// # Errors
/// Returns an error if the configuration is invalid or the server fails to start
pub async fn new(port: u16, dsn: String, config: AuthConfig) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    // Sessions ride on cookies, so CORS must name the frontend origin and
    // allow credentials; browsers reject wildcard origins here.
    let origin = config
        .frontend_base_url()
        .trim_end_matches('/')
        .parse::<HeaderValue>()
        .map_err(|_| anyhow!("Invalid frontend URL for the CORS origin"))?;

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .allow_origin(origin)
        .allow_credentials(true);

    let config = Arc::new(config);

    let app = Router::new()
        .route("/v1/auth/nonce", get(auth::nonce))
        .route("/v1/auth/verify", post(auth::verify))
        .route("/v1/auth/session", get(auth::session))
        .route("/v1/auth/logout", post(auth::logout))
        .route("/live", get(health::live))
        .route("/ready", get(health::ready))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(config))
                .layer(Extension(pool.clone())),
        )
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi()))
        .route("/health", get(health::health).options(health::health))
        .layer(Extension(pool));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let path = request.uri().path();
    let request_id = headers
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", path, ?headers, request_id)
}

#[cfg(test)]
mod tests {
    use super::openapi;

    #[test]
    fn openapi_documents_auth_endpoints() {
        let doc = openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/v1/auth/nonce"));
        assert!(paths.contains_key("/v1/auth/verify"));
        assert!(paths.contains_key("/v1/auth/session"));
        assert!(paths.contains_key("/v1/auth/logout"));
        assert!(paths.contains_key("/health"));
    }
}
