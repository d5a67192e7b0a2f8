//! Bearer session check → identity in RequestContext.
//!
//! Per request:
//! 1. normalize the path and consult the exemption set; exempt requests pass
//!    through with no identity
//! 2. `Authorization: Bearer <token>` missing or malformed → 401
//! 3. token not in the cache (unknown, expired, revoked) → 403
//! 4. re-resolve the cached user against the identity store; a vanished user
//!    or a store failure → 403
//! 5. derive a context carrying the live identity and forward
//!
//! Rejections short-circuit: the inner service is never called.

use std::fmt;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
};

use crate::api::v1::extractors::RequestContext;
use crate::error::AppError;
use crate::middleware::auth::exemption::{ExemptionSet, normalize_path};
use crate::services::auth::bearer::{bearer_token, fingerprint};
use crate::services::identity::IdentityStore;
use crate::services::token_cache::TokenCache;

/// Dependencies of the access middleware, built once at startup.
#[derive(Clone)]
pub struct AccessState {
    pub tokens: TokenCache,
    pub exemptions: Arc<ExemptionSet>,
    pub identities: Arc<dyn IdentityStore>,
}

impl fmt::Debug for AccessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessState")
            .field("exemptions", &self.exemptions)
            .field("sessions", &self.tokens.len())
            .finish_non_exhaustive()
    }
}

impl AccessState {
    pub fn new(
        tokens: TokenCache,
        exemptions: ExemptionSet,
        identities: Arc<dyn IdentityStore>,
    ) -> Self {
        Self {
            tokens,
            exemptions: Arc::new(exemptions),
            identities,
        }
    }
}

/// Apply the access check to every route of `router`.
pub fn apply<S>(router: Router<S>, state: AccessState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(state, access_middleware))
}

pub async fn access_middleware(
    State(state): State<AccessState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ctx = req
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_default();

    let path = normalize_path(req.uri().path()).to_owned();
    if state.exemptions.is_exempt(&path) {
        req.extensions_mut().insert(ctx);
        return Ok(next.run(req).await);
    }

    let remote = ctx.remote_address().unwrap_or("unknown");

    let Some(token) = bearer_token(req.headers()).map(str::to_owned) else {
        tracing::info!(parent: ctx.span(), path = %path, remote, "missing or malformed bearer token");
        return Err(AppError::Unauthenticated);
    };

    let Some(cached) = state.tokens.lookup(&token) else {
        tracing::error!(
            parent: ctx.span(),
            token = %fingerprint(&token),
            remote,
            "bearer token not found in session cache"
        );
        return Err(AppError::InvalidCredentials);
    };

    let identity = match state.identities.find_by_stable_id(cached.user_id).await {
        Ok(Some(identity)) => identity,
        Ok(None) => {
            tracing::error!(
                parent: ctx.span(),
                user_id = cached.user_id,
                login_name = %cached.login_name,
                token = %fingerprint(&token),
                "session refers to an identity that no longer exists"
            );
            return Err(AppError::InvalidCredentials);
        }
        Err(err) => {
            tracing::error!(
                parent: ctx.span(),
                user_id = cached.user_id,
                error = ?err,
                "identity lookup failed"
            );
            return Err(AppError::InvalidCredentials);
        }
    };

    req.extensions_mut()
        .insert(ctx.with_identity(Arc::new(identity)));

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
        routing::get,
    };
    use tower::ServiceExt;

    use crate::api::v1::extractors::Ctx;
    use crate::services::identity::memory::{MemoryIdentityStore, identity};
    use crate::services::identity::CachedIdentity;

    struct Fixture {
        router: Router,
        tokens: TokenCache,
        store: Arc<MemoryIdentityStore>,
    }

    // Echoes the identity the handler sees, or "anonymous".
    async fn whoami(Ctx(ctx): Ctx) -> String {
        match ctx.require_identity() {
            Ok(identity) => identity.email.clone(),
            Err(_) => "anonymous".to_string(),
        }
    }

    fn fixture() -> Fixture {
        let tokens = TokenCache::default();
        let store = Arc::new(MemoryIdentityStore::with_users([identity(1, "u@example.com")]));
        let state = AccessState::new(
            tokens.clone(),
            ExemptionSet::new(["/users", "/auth/token"]),
            store.clone(),
        );
        let router = apply(
            Router::new()
                .route("/users", get(whoami))
                .route("/me", get(whoami)),
            state,
        );
        Fixture {
            router,
            tokens,
            store,
        }
    }

    fn request(path: &str, auth: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(path);
        if let Some(value) = auth {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn login(f: &Fixture, token: &str, user_id: i64) {
        f.tokens.store(
            token,
            CachedIdentity {
                user_id,
                login_name: "u@example.com".into(),
            },
        );
    }

    #[tokio::test]
    async fn exempt_path_without_header_reaches_handler_anonymously() {
        let f = fixture();
        let response = f.router.oneshot(request("/users", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "anonymous");
        assert_eq!(f.store.lookups(), 0);
    }

    #[tokio::test]
    async fn missing_header_is_401() {
        let f = fixture();
        let response = f.router.oneshot(request("/me", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    }

    #[tokio::test]
    async fn malformed_header_is_401() {
        let f = fixture();
        let response = f
            .router
            .oneshot(request("/me", Some("Basic dXNlcjpwYXNz")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_token_is_rejected_before_identity_store() {
        let f = fixture();
        let response = f
            .router
            .oneshot(request("/me", Some("Bearer not-a-session")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(f.store.lookups(), 0);
    }

    #[tokio::test]
    async fn valid_token_puts_live_identity_in_context() {
        let f = fixture();
        login(&f, "tok", 1);

        let response = f
            .router
            .oneshot(request("/me", Some("Bearer tok")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "u@example.com");
        assert_eq!(f.store.lookups(), 1);
    }

    #[tokio::test]
    async fn session_for_deleted_identity_is_rejected() {
        let f = fixture();
        login(&f, "tok", 1);
        f.store.remove(1);

        let response = f
            .router
            .oneshot(request("/me", Some("Bearer tok")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn identity_store_failure_reads_as_invalid_credentials() {
        let f = fixture();
        login(&f, "tok", 1);
        f.store.fail();

        let response = f
            .router
            .oneshot(request("/me", Some("Bearer tok")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn rejection_bodies_do_not_reveal_cause() {
        let f = fixture();
        login(&f, "gone", 99);

        let unknown = f
            .router
            .clone()
            .oneshot(request("/me", Some("Bearer nope")))
            .await
            .unwrap();
        let vanished = f
            .router
            .oneshot(request("/me", Some("Bearer gone")))
            .await
            .unwrap();

        assert_eq!(unknown.status(), vanished.status());
        assert_eq!(body_string(unknown).await, body_string(vanished).await);
    }

    #[tokio::test]
    async fn exempt_path_with_header_is_still_anonymous() {
        let f = fixture();
        login(&f, "tok", 1);

        let response = f
            .router
            .oneshot(request("/users", Some("Bearer tok")))
            .await
            .unwrap();

        assert_eq!(body_string(response).await, "anonymous");
        assert_eq!(f.store.lookups(), 0);
    }
}
