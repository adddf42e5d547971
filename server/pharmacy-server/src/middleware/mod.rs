//! Middleware and extractors for request processing

pub mod auth_context;
pub mod extractors;
pub mod request_context;

pub use auth_context::AuthContext;
pub use extractors::{ApiJson, ApiPath, ApiQuery};
pub use request_context::RequestContext;

use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, CorsLayer};

const SLOW_REQUEST: Duration = Duration::from_secs(1);

/// Request timing middleware for performance monitoring
pub async fn request_timing_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;
    let duration = start.elapsed();

    if duration > SLOW_REQUEST {
        tracing::warn!(
            method = %method,
            uri = %uri,
            status = response.status().as_u16(),
            duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            "Slow request detected"
        );
    } else {
        tracing::info!(
            method = %method,
            uri = %uri,
            status = response.status().as_u16(),
            duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            "Request completed"
        );
    }

    response
}

/// CORS layer for the configured origins. An empty list or `*` allows any origin.
pub fn create_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter(|origin| origin.as_str() != "*")
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .max_age(Duration::from_secs(3600))
}
