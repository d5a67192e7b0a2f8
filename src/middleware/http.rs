//! HTTP-level middleware (cross-cutting concerns).
//!
//! Responsibility:
//! - Request-Id generation + propagation (X-Request-Id)
//! - The request logger, wrapping every layer below it
//! - CORS, body size limits, global timeouts
//! - Trailing-slash normalization ahead of routing
//!
//! Notes:
//! - Path normalization has to wrap the whole Router: by the time a
//!   `Router::layer` middleware runs, routing has already happened.
//! - Rejections produced here (413, 408, CORS preflight) happen inside the
//!   logger, so they get a request record like any handler response.

use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::http::{StatusCode, header::HeaderName};
use axum::middleware;
use tower::timeout::TimeoutLayer;
use tower::{BoxError, Layer, ServiceBuilder};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::config::Config;
use crate::middleware::cors;
use crate::middleware::request_log::{RequestLogState, X_REQUEST_ID, request_log_middleware};

/// Apply HTTP-level middleware to the given Router.
///
/// Layer order (outermost first): request id → propagate → request log → CORS
/// → error mapping → body limit → timeout.
pub fn apply(router: Router, config: &Config, request_log: RequestLogState) -> Router {
    let request_id_header = HeaderName::from_static(X_REQUEST_ID);

    let layers = ServiceBuilder::new()
        // Generate a request id if missing, then propagate it to the response.
        .layer(SetRequestIdLayer::new(
            request_id_header.clone(),
            MakeRequestUuid,
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header))
        .layer(middleware::from_fn_with_state(
            request_log,
            request_log_middleware,
        ))
        .layer(cors::layer(config))
        // Make the service error `Infallible` by converting errors into responses.
        .layer(HandleErrorLayer::new(|err: BoxError| async move {
            if err.is::<tower::timeout::error::Elapsed>() {
                StatusCode::REQUEST_TIMEOUT
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }))
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(TimeoutLayer::new(config.request_timeout));

    router.layer(layers)
}

/// Strip trailing slashes before the router sees the path.
pub fn normalize(router: Router) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(router)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, header};
    use axum::routing::{get, post};
    use tower::ServiceExt;

    use crate::middleware::request_log::capture::LogCapture;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let mut env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        env.insert("DATABASE_URL".into(), "postgres://localhost/unused".into());
        Config::from_lookup(|key| env.get(key).cloned()).unwrap()
    }

    async fn slow() -> &'static str {
        tokio::time::sleep(Duration::from_secs(60)).await;
        "late"
    }

    async fn echo(body: String) -> String {
        body
    }

    fn app(config: &Config) -> Router {
        let router = Router::new()
            .route("/slow", get(slow))
            .route("/echo", post(echo))
            .route("/me", get(|| async { "me" }));
        apply(router, config, RequestLogState::default())
    }

    #[tokio::test]
    async fn oversized_body_is_logged() {
        let logs = LogCapture::install();
        let config = config(&[("MAX_BODY_BYTES", "10")]);

        let body = "x".repeat(200);
        let request = Request::builder()
            .method("POST")
            .uri("/echo")
            .header(header::CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .unwrap();
        let response = app(&config).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let out = logs.contents();
        assert!(out.contains("POST /echo"), "{out}");
        assert!(out.contains("status_code=413"), "{out}");
    }

    #[tokio::test]
    async fn cors_preflight_is_logged() {
        let logs = LogCapture::install();
        let config = config(&[]);

        let request = Request::builder()
            .method("OPTIONS")
            .uri("/me")
            .header(header::ORIGIN, "https://app.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap();
        let response = app(&config).oneshot(request).await.unwrap();

        assert!(response.status().is_success());
        assert!(response.headers().contains_key(X_REQUEST_ID));
        let out = logs.contents();
        assert!(out.contains("OPTIONS /me"), "{out}");
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_logged() {
        let logs = LogCapture::install();
        let config = config(&[("REQUEST_TIMEOUT_SECONDS", "1")]);

        let request = Request::builder().uri("/slow").body(Body::empty()).unwrap();
        let response = app(&config).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        let out = logs.contents();
        assert!(out.contains("GET /slow"), "{out}");
        assert!(out.contains("status_code=408"), "{out}");
    }

    #[tokio::test]
    async fn logged_request_id_matches_response_header() {
        let logs = LogCapture::install();
        let config = config(&[]);

        let request = Request::builder().uri("/me").body(Body::empty()).unwrap();
        let response = app(&config).oneshot(request).await.unwrap();

        let id = response.headers()[X_REQUEST_ID].to_str().unwrap().to_string();
        assert!(logs.contents().contains(&id));
    }
}
