/*
 * Responsibility
 * - v1 URL structure
 * - Per-request layers that need the v1 view of the path: access check, embed parsing
 *
 * Exempt by default (AUTH_EXEMPT_PATHS): /health, /users, /auth/token.
 * Everything else requires a bearer session.
 */
use axum::{
    Router, middleware,
    routing::{get, patch, post},
};

use crate::middleware::{auth::access, embed::embed_middleware};
use crate::state::AppState;

use crate::api::v1::handlers::{
    auth::{issue_token, logout},
    bookmarks::{create_bookmark, delete_bookmark, get_bookmark, list_bookmarks, update_bookmark},
    folders::{add_bookmark, create_folder, get_folder, list_folders},
    health::health,
    users::{create_user, me},
};

pub fn routes(state: &AppState) -> Router<AppState> {
    let router = Router::new()
        .route("/health", get(health))
        .route("/users", post(create_user))
        .route("/me", get(me))
        .route("/auth/token", post(issue_token))
        .route("/auth/logout", post(logout))
        .route("/bookmarks", get(list_bookmarks).post(create_bookmark))
        .route(
            "/bookmarks/{bookmark_id}",
            get(get_bookmark).patch(update_bookmark).delete(delete_bookmark),
        )
        .route("/folders", get(list_folders).post(create_folder))
        .route("/folders/{folder_id}", get(get_folder))
        .route(
            "/folders/{folder_id}/bookmarks/{bookmark_id}",
            patch(add_bookmark),
        )
        // Innermost first: embed runs after the access check.
        .layer(middleware::from_fn(embed_middleware));

    access::apply(router, state.access.clone())
}
