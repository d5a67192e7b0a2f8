use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::services::identity::Identity;

use super::RequestContext;

/// Extractor that hands the RequestContext to a handler.
/// Assumes the middleware chain already inserted it into request.extensions().
/// A missing context is a wiring bug, so it answers 500.
pub struct Ctx(pub RequestContext);

impl<S> FromRequestParts<S> for Ctx
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<RequestContext>() {
            Some(ctx) => Ok(Ctx(ctx.clone())),
            None => {
                tracing::error!(uri = %parts.uri, "request context missing; middleware not applied");
                Err(AppError::Internal)
            }
        }
    }
}

/// The authenticated identity, or 401 when the request carries none.
pub struct AuthUser(pub Arc<Identity>);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Ctx(ctx) = Ctx::from_request_parts(parts, state).await?;
        let identity = ctx.require_identity()?;
        Ok(AuthUser(identity.clone()))
    }
}
