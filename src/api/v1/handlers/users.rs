/*
 * Responsibility
 * - POST /users (sign-up; exempt)
 * - GET /me (the identity resolved by the access middleware)
 */
use axum::{Json, extract::State, http::StatusCode};

use crate::{
    api::v1::{
        dto::users::{CreateUserRequest, CreatedResponse, UserResponse},
        extractors::AuthUser,
        handlers::invalid,
    },
    error::AppError,
    repos::error::RepoError,
    services::password::hash_password,
    state::AppState,
};

pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    req.validate().map_err(invalid)?;

    let password = req.password;
    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|_| AppError::Internal)?
        .map_err(|e| {
            tracing::error!(error = %e, "password hashing failed");
            AppError::Internal
        })?;

    let row = state
        .users
        .create(req.email.trim(), &hash)
        .await
        .map_err(|e| match e {
            RepoError::Conflict => AppError::conflict("user"),
            other => other.into(),
        })?;

    tracing::info!(user_id = row.id, "user created");
    Ok((StatusCode::CREATED, Json(CreatedResponse { id: row.id })))
}

pub async fn me(AuthUser(identity): AuthUser) -> Json<UserResponse> {
    Json(UserResponse::from(identity.as_ref()))
}
