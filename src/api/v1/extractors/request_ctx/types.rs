/*
 * Responsibility
 * - Per-request context carried through the middleware chain in request extensions
 * - Each layer derives a new value with `with_*`; a stored value is never mutated
 *
 * Notes
 * - Identity is optional by construction. Handlers must go through
 *   `require_identity()` (or the `AuthUser` extractor) and handle absence.
 */
use std::sync::Arc;

use thiserror::Error;
use tracing::Span;

use crate::services::embed::{EmbedRequest, EmbedSet, ResourceKind};
use crate::services::identity::Identity;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("no authenticated identity in request context")]
pub struct MissingIdentity;

#[derive(Debug, Clone)]
pub struct RequestContext {
    identity: Option<Arc<Identity>>,
    span: Span,
    request_id: Option<Arc<str>>,
    remote_address: Option<Arc<str>>,
    embeds: EmbedRequest,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            identity: None,
            span: Span::none(),
            request_id: None,
            remote_address: None,
            embeds: EmbedRequest::default(),
        }
    }
}

impl RequestContext {
    pub fn with_identity(&self, identity: Arc<Identity>) -> Self {
        let mut next = self.clone();
        next.identity = Some(identity);
        next
    }

    pub fn with_span(&self, span: Span) -> Self {
        let mut next = self.clone();
        next.span = span;
        next
    }

    pub fn with_request_id(&self, request_id: impl Into<Arc<str>>) -> Self {
        let mut next = self.clone();
        next.request_id = Some(request_id.into());
        next
    }

    pub fn with_remote_address(&self, address: impl Into<Arc<str>>) -> Self {
        let mut next = self.clone();
        next.remote_address = Some(address.into());
        next
    }

    pub fn with_embeds(&self, embeds: EmbedRequest) -> Self {
        let mut next = self.clone();
        next.embeds = embeds;
        next
    }

    pub fn require_identity(&self) -> Result<&Arc<Identity>, MissingIdentity> {
        self.identity.as_ref().ok_or(MissingIdentity)
    }

    /// Request-scoped logger: emit with `tracing::info!(parent: ctx.span(), ...)`.
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn remote_address(&self) -> Option<&str> {
        self.remote_address.as_deref()
    }

    /// Embeds the client asked for that are valid for `kind`.
    pub fn embeds(&self, kind: ResourceKind) -> EmbedSet {
        self.embeds.resolve(kind)
    }
}
