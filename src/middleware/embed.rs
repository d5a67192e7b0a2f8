//! Reads `?embed=` once per request and threads it through RequestContext.
//!
//! Only the raw names are stored here; handlers resolve them against the
//! whitelist of the resource they serve (`RequestContext::embeds(kind)`).
//! A missing or unparsable query string means "no embeds", never an error.

use axum::{
    extract::{Query, Request},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;

use crate::api::v1::extractors::RequestContext;
use crate::services::embed::EmbedRequest;

#[derive(Debug, Default, Deserialize)]
struct EmbedQuery {
    embed: Option<String>,
}

pub async fn embed_middleware(mut req: Request, next: Next) -> Response {
    let query = Query::<EmbedQuery>::try_from_uri(req.uri())
        .map(|Query(q)| q)
        .unwrap_or_default();
    let embeds = EmbedRequest::from_query_value(query.embed.as_deref());

    let ctx = req
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_default();
    if !embeds.names().is_empty() {
        tracing::debug!(parent: ctx.span(), embed = ?embeds.names(), "embed requested");
    }
    let ctx = ctx.with_embeds(embeds);
    req.extensions_mut().insert(ctx);

    next.run(req).await
}
