//! Outermost request layer: one structured record per request.
//!
//! Responsibility:
//! - Open the request span (the logger handle carried by RequestContext)
//! - Derive the client address, honouring a configured number of proxy hops
//! - Recover from a panic anywhere below, answer 500 and log it with a backtrace
//! - Emit `METHOD URI` with status, duration, and remote address
//!
//! The backtrace is recorded by the process panic hook (`record_panic_trace`)
//! on the panicking thread and picked up here after `catch_unwind`, which
//! resumes on that same thread within the same poll.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::net::{IpAddr, SocketAddr};
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures::FutureExt;
use tracing::Instrument;
use uuid::Uuid;

use crate::api::v1::extractors::RequestContext;
use crate::error::AppError;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REQUEST_ID: &str = "x-request-id";

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogState {
    /// Number of trusted reverse proxies in front of the service.
    pub proxy_count: usize,
}

thread_local! {
    static PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Called from the panic hook: remember where the current thread panicked.
pub fn record_panic_trace() {
    let trace = Backtrace::force_capture().to_string();
    PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
}

fn take_panic_trace() -> Option<String> {
    PANIC_TRACE.with(|slot| slot.borrow_mut().take())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

pub async fn request_log_middleware(
    State(state): State<RequestLogState>,
    mut req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();

    let request_id = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let transport = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string());
    let forwarded = req
        .headers()
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok());
    let remote = client_address(forwarded, transport.as_deref(), state.proxy_count);

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        uri = %uri,
        remote = %remote
    );
    let ctx = req
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_default()
        .with_span(span.clone())
        .with_request_id(request_id.as_str())
        .with_remote_address(remote.as_str());
    req.extensions_mut().insert(ctx);

    // Drop a trace left by an earlier panic on this thread; resume_unwind skips the hook.
    take_panic_trace();
    let outcome = AssertUnwindSafe(next.run(req).instrument(span.clone()))
        .catch_unwind()
        .await;

    let response = match outcome {
        Ok(response) => response,
        Err(payload) => {
            let trace = take_panic_trace().unwrap_or_else(|| "backtrace unavailable".to_string());
            tracing::error!(
                parent: &span,
                panic = %panic_message(payload.as_ref()),
                backtrace = %trace,
                "request handler panicked"
            );
            AppError::Internal.into_response()
        }
    };

    tracing::info!(
        parent: &span,
        status_code = response.status().as_u16(),
        duration = ?start.elapsed(),
        "{} {}",
        method,
        uri
    );

    response
}

/// Client address for logging.
///
/// With `proxy_count > 0` and a forwarded-for header present, the address is
/// taken `proxy_count` entries from the END of the list; entries a client
/// prepends itself are never trusted. If the list is shorter than the hop
/// count, its first entry is used. Otherwise the transport address is used.
/// Ports (and IPv6 brackets) are stripped.
pub fn client_address(
    forwarded_for: Option<&str>,
    transport: Option<&str>,
    proxy_count: usize,
) -> String {
    let mut addr = transport.unwrap_or_default();

    if proxy_count > 0
        && let Some(header) = forwarded_for.map(str::trim).filter(|h| !h.is_empty())
    {
        let hops: Vec<&str> = header.split(',').collect();
        addr = if proxy_count > hops.len() {
            hops[0]
        } else {
            hops[hops.len() - proxy_count]
        };
    }

    let host = strip_port(addr);
    if host.is_empty() { "unknown".to_string() } else { host }
}

fn strip_port(addr: &str) -> String {
    let addr = addr.trim();
    if let Ok(sock) = addr.parse::<SocketAddr>() {
        return sock.ip().to_string();
    }
    if let Ok(ip) = addr.parse::<IpAddr>() {
        return ip.to_string();
    }
    if let Some(rest) = addr.strip_prefix('[')
        && let Some((host, _)) = rest.split_once(']')
    {
        return host.to_string();
    }
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.bytes().all(|b| b.is_ascii_digit()) => {
            host.to_string()
        }
        _ => addr.to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Once;

    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
    };
    use tower::ServiceExt;

    use super::capture::LogCapture;
    use crate::api::v1::extractors::Ctx;

    const CHAIN: &str = "1.2.3.4, 5.6.6.5, 7.8.9.10";

    #[test]
    fn walks_back_from_the_end_of_forwarded_for() {
        assert_eq!(client_address(Some(CHAIN), Some("10.0.0.1:1"), 2), "5.6.6.5");
        assert_eq!(client_address(Some(CHAIN), Some("10.0.0.1:1"), 1), "7.8.9.10");
        assert_eq!(client_address(Some(CHAIN), Some("10.0.0.1:1"), 3), "1.2.3.4");
    }

    #[test]
    fn short_forwarded_list_falls_back_to_first_entry() {
        assert_eq!(client_address(Some(CHAIN), None, 7), "1.2.3.4");
    }

    #[test]
    fn forwarded_for_ignored_without_proxies() {
        assert_eq!(client_address(Some(CHAIN), Some("10.0.0.1:5555"), 0), "10.0.0.1");
    }

    #[test]
    fn missing_header_uses_transport_address() {
        assert_eq!(client_address(None, Some("10.0.0.1:5555"), 2), "10.0.0.1");
        assert_eq!(client_address(Some("  "), Some("10.0.0.1:5555"), 2), "10.0.0.1");
        assert_eq!(client_address(None, None, 0), "unknown");
    }

    #[test]
    fn strips_ports_and_ipv6_brackets() {
        assert_eq!(client_address(None, Some("[::1]:8080"), 0), "::1");
        assert_eq!(client_address(None, Some("[2001:db8::1]"), 0), "2001:db8::1");
        assert_eq!(client_address(Some("2001:db8::2"), None, 1), "2001:db8::2");
        assert_eq!(client_address(Some("9.9.9.9:443"), None, 1), "9.9.9.9");
        assert_eq!(client_address(None, Some("localhost:80"), 0), "localhost");
    }

    async fn boom() -> &'static str {
        panic!("handler exploded")
    }

    async fn rethrow() -> &'static str {
        std::panic::resume_unwind(Box::new("rethrown from a joined task"))
    }

    async fn teapot() -> StatusCode {
        StatusCode::IM_A_TEAPOT
    }

    async fn ids(Ctx(ctx): Ctx) -> String {
        format!(
            "{}|{}",
            ctx.request_id().unwrap_or_default(),
            ctx.remote_address().unwrap_or_default()
        )
    }

    fn app() -> Router {
        Router::new()
            .route("/boom", get(boom))
            .route("/rethrow", get(rethrow))
            .route("/teapot", get(teapot))
            .route("/ids", get(ids))
            .layer(middleware::from_fn_with_state(
                RequestLogState { proxy_count: 1 },
                request_log_middleware,
            ))
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn install_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(crate::app::init_panic_hook);
    }

    #[tokio::test]
    async fn panic_becomes_500_and_service_keeps_serving() {
        let app = app();

        let response = app.clone().oneshot(get_req("/boom")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = app.oneshot(get_req("/teapot")).await.unwrap();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    }

    #[tokio::test]
    async fn panic_is_logged_with_backtrace_and_status() {
        install_hook();
        let logs = LogCapture::install();

        let response = app().oneshot(get_req("/boom")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let out = logs.contents();
        assert!(out.contains("request handler panicked"), "{out}");
        assert!(out.contains("handler exploded"), "{out}");
        assert!(out.contains("backtrace="), "{out}");
        assert!(!out.contains("backtrace unavailable"), "{out}");
        assert!(out.contains("GET /boom"), "{out}");
        assert!(out.contains("status_code=500"), "{out}");
        assert!(out.contains("duration="), "{out}");
    }

    #[tokio::test]
    async fn stale_trace_is_not_reused() {
        let logs = LogCapture::install();

        // As if an earlier panic on this thread left its trace behind.
        record_panic_trace();
        let response = app().oneshot(get_req("/rethrow")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let out = logs.contents();
        assert!(out.contains("rethrown from a joined task"), "{out}");
        assert!(out.contains("backtrace unavailable"), "{out}");
    }

    #[tokio::test]
    async fn completion_record_carries_status_and_duration() {
        let logs = LogCapture::install();

        app().oneshot(get_req("/teapot")).await.unwrap();

        let out = logs.contents();
        assert!(out.contains("GET /teapot"), "{out}");
        assert!(out.contains("status_code=418"), "{out}");
        assert!(out.contains("duration="), "{out}");
    }

    #[tokio::test]
    async fn context_carries_request_id_and_remote() {
        let request = Request::builder()
            .uri("/ids")
            .header(X_REQUEST_ID, "req-1")
            .header(X_FORWARDED_FOR, "6.6.6.6, 8.8.8.8")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"req-1|8.8.8.8");
    }
}
