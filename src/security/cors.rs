//! Cross-origin access for browser players.
//!
//! # Responsibilities
//! - Allow configured origins (`*` mirrors the caller's origin)
//! - Allow GET/POST/OPTIONS and the `X-Auth-Token` header
//! - Answer every `OPTIONS` request with an empty 200
//!
//! # Design Decisions
//! - Credentials are allowed, so `*` is never sent literally
//! - Range framing headers are exposed so scripts can read them

use std::time::Duration;

use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::CorsConfig;

pub const X_AUTH_TOKEN: HeaderName = HeaderName::from_static("x-auth-token");

pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins = if config.allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(
            config
                .allowed_origins
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                        None
                    }
                }),
        )
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, X_AUTH_TOKEN])
        .expose_headers([
            header::CONTENT_RANGE,
            header::CONTENT_LENGTH,
            header::ACCEPT_RANGES,
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(config.max_age_secs))
}

/// Short-circuit `OPTIONS` that `CorsLayer` does not treat as a preflight
/// (no `Access-Control-Request-Method`).
pub async fn answer_options(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    next.run(request).await
}
