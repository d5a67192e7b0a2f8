/*
 * Responsibility
 * - /bookmarks CRUD, scoped to the caller
 * - Embeds: owner, folders
 */
use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use sqlx::PgPool;

use crate::{
    api::v1::{
        dto::{
            bookmarks::{BookmarkResponse, CreateBookmarkRequest, UpdateBookmarkRequest},
            folders::FolderSummary,
            users::UserResponse,
        },
        extractors::{Ctx, RequestContext},
        handlers::invalid,
    },
    error::AppError,
    repos::bookmark_repo::{self, BookmarkRow},
    services::{
        embed::{EmbedSet, Relation, ResourceKind},
        identity::Identity,
    },
    state::AppState,
};

/// Load a bookmark the caller owns: 404 if missing, 403 if someone else's.
pub(crate) async fn load_owned(
    db: &PgPool,
    ctx: &RequestContext,
    caller: &Identity,
    id: i64,
) -> Result<BookmarkRow, AppError> {
    let row = bookmark_repo::get(db, id)
        .await?
        .ok_or(AppError::not_found("bookmark"))?;

    if row.owner_id != caller.id {
        tracing::info!(parent: ctx.span(), bookmark_id = id, user_id = caller.id, "bookmark access denied");
        return Err(AppError::Forbidden);
    }
    Ok(row)
}

async fn render(
    db: &PgPool,
    rows: Vec<BookmarkRow>,
    caller: &Identity,
    embeds: &EmbedSet,
) -> Result<Vec<BookmarkResponse>, AppError> {
    if embeds.is_empty() {
        return Ok(rows.into_iter().map(BookmarkResponse::from).collect());
    }

    let with_folders = embeds.contains(Relation::Folders);
    let with_owner = embeds.contains(Relation::Owner);

    let mut folders: HashMap<i64, Vec<FolderSummary>> = HashMap::new();
    if with_folders {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        for link in bookmark_repo::folders_for(db, &ids).await? {
            folders
                .entry(link.bookmark_id)
                .or_default()
                .push(FolderSummary::from(&link.folder));
        }
    }

    // Only owners can read a bookmark, so the owner is always the caller.
    let res = rows
        .into_iter()
        .map(|row| {
            let id = row.id;
            let mut res = BookmarkResponse::from(row);
            if with_owner {
                res.owner = Some(UserResponse::from(caller));
            }
            if with_folders {
                res.folders = Some(folders.remove(&id).unwrap_or_default());
            }
            res
        })
        .collect();

    Ok(res)
}

async fn render_one(
    db: &PgPool,
    row: BookmarkRow,
    caller: &Identity,
    embeds: &EmbedSet,
) -> Result<BookmarkResponse, AppError> {
    render(db, vec![row], caller, embeds)
        .await?
        .pop()
        .ok_or(AppError::Internal)
}

pub async fn list_bookmarks(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
) -> Result<Json<Vec<BookmarkResponse>>, AppError> {
    let caller = ctx.require_identity()?;
    let rows = bookmark_repo::list_by_owner(&state.db, caller.id).await?;

    let embeds = ctx.embeds(ResourceKind::Bookmark);
    Ok(Json(render(&state.db, rows, caller, &embeds).await?))
}

pub async fn create_bookmark(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Json(req): Json<CreateBookmarkRequest>,
) -> Result<(StatusCode, Json<BookmarkResponse>), AppError> {
    let caller = ctx.require_identity()?;
    req.validate().map_err(invalid)?;

    let row = bookmark_repo::create(
        &state.db,
        caller.id,
        req.name.trim(),
        req.url.trim(),
        req.color.as_deref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(BookmarkResponse::from(row))))
}

pub async fn get_bookmark(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(bookmark_id): Path<i64>,
) -> Result<Json<BookmarkResponse>, AppError> {
    let caller = ctx.require_identity()?;
    let row = load_owned(&state.db, &ctx, caller, bookmark_id).await?;

    let embeds = ctx.embeds(ResourceKind::Bookmark);
    Ok(Json(render_one(&state.db, row, caller, &embeds).await?))
}

pub async fn update_bookmark(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(bookmark_id): Path<i64>,
    Json(req): Json<UpdateBookmarkRequest>,
) -> Result<Json<BookmarkResponse>, AppError> {
    let caller = ctx.require_identity()?;
    req.validate().map_err(invalid)?;
    load_owned(&state.db, &ctx, caller, bookmark_id).await?;

    // color tri-state:
    // - None: do not update
    // - Some(None): set NULL
    // - Some(Some(v)): set v
    let color: Option<Option<&str>> = req.color.as_ref().map(|inner| inner.as_deref());

    let row = bookmark_repo::update(
        &state.db,
        bookmark_id,
        req.name.as_deref().map(str::trim),
        req.url.as_deref().map(str::trim),
        color,
    )
    .await?
    .ok_or(AppError::not_found("bookmark"))?;

    let embeds = ctx.embeds(ResourceKind::Bookmark);
    Ok(Json(render_one(&state.db, row, caller, &embeds).await?))
}

pub async fn delete_bookmark(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(bookmark_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let caller = ctx.require_identity()?;
    load_owned(&state.db, &ctx, caller, bookmark_id).await?;

    if bookmark_repo::delete(&state.db, bookmark_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("bookmark"))
    }
}
