/*
 * Responsibility
 * - POST /auth/token: password login, returns a bearer token (exempt)
 * - POST /auth/logout: revokes the presented token
 */
use axum::{Json, extract::State, http::HeaderMap, http::StatusCode};

use crate::{
    api::v1::{
        dto::token::{TokenRequest, TokenResponse},
        extractors::Ctx,
    },
    error::AppError,
    services::auth::{bearer::bearer_token, session::LoginError},
    state::AppState,
};

pub async fn issue_token(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Json(req): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let issued = match state.sessions.login(req.email.trim(), &req.password).await {
        Ok(issued) => issued,
        Err(LoginError::InvalidLogin) => {
            tracing::info!(
                parent: ctx.span(),
                request_id = ctx.request_id().unwrap_or_default(),
                remote = ctx.remote_address().unwrap_or("unknown"),
                "login rejected"
            );
            return Err(LoginError::InvalidLogin.into());
        }
        Err(err) => return Err(err.into()),
    };
    Ok(Json(TokenResponse::from(issued)))
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    // The access middleware has already validated this header.
    let token = bearer_token(&headers).ok_or(AppError::Unauthenticated)?;
    state.sessions.logout(token);
    Ok(StatusCode::NO_CONTENT)
}
