/*
 * Responsibility
 * - /folders listing, creation, bookmark membership
 * - Embeds: owner, parent, bookmarks
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
            bookmarks::BookmarkSummary,
            folders::{CreateFolderRequest, FolderResponse, FolderSummary},
            users::UserResponse,
        },
        extractors::{Ctx, RequestContext},
        handlers::{bookmarks, invalid},
    },
    error::AppError,
    repos::folder_repo::{self, FolderRow},
    services::{
        embed::{EmbedSet, Relation, ResourceKind},
        identity::Identity,
    },
    state::AppState,
};

async fn load_owned(
    db: &PgPool,
    ctx: &RequestContext,
    caller: &Identity,
    id: i64,
) -> Result<FolderRow, AppError> {
    let row = folder_repo::get(db, id)
        .await?
        .ok_or(AppError::not_found("folder"))?;

    if row.owner_id != caller.id {
        tracing::info!(parent: ctx.span(), folder_id = id, user_id = caller.id, "folder access denied");
        return Err(AppError::Forbidden);
    }
    Ok(row)
}

async fn render(
    db: &PgPool,
    rows: Vec<FolderRow>,
    caller: &Identity,
    embeds: &EmbedSet,
) -> Result<Vec<FolderResponse>, AppError> {
    if embeds.is_empty() {
        return Ok(rows.into_iter().map(FolderResponse::from).collect());
    }

    let with_owner = embeds.contains(Relation::Owner);
    let with_parent = embeds.contains(Relation::Parent);
    let with_bookmarks = embeds.contains(Relation::Bookmarks);

    let mut parents: HashMap<i64, FolderSummary> = HashMap::new();
    if with_parent {
        let mut ids: Vec<i64> = rows.iter().filter_map(|r| r.parent_id).collect();
        ids.sort_unstable();
        ids.dedup();
        for parent in folder_repo::get_many(db, &ids).await? {
            parents.insert(parent.id, FolderSummary::from(&parent));
        }
    }

    let mut contents: HashMap<i64, Vec<BookmarkSummary>> = HashMap::new();
    if with_bookmarks {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        for link in folder_repo::bookmarks_for(db, &ids).await? {
            contents
                .entry(link.folder_id)
                .or_default()
                .push(BookmarkSummary::from(&link.bookmark));
        }
    }

    let res = rows
        .into_iter()
        .map(|row| {
            let id = row.id;
            let parent_id = row.parent_id;
            let mut res = FolderResponse::from(row);
            if with_owner {
                res.owner = Some(UserResponse::from(caller));
            }
            if with_parent {
                res.parent = Some(parent_id.and_then(|p| parents.get(&p).cloned()));
            }
            if with_bookmarks {
                res.bookmarks = Some(contents.remove(&id).unwrap_or_default());
            }
            res
        })
        .collect();

    Ok(res)
}

pub async fn list_folders(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
) -> Result<Json<Vec<FolderResponse>>, AppError> {
    let caller = ctx.require_identity()?;
    let rows = folder_repo::list_by_owner(&state.db, caller.id).await?;

    let embeds = ctx.embeds(ResourceKind::Folder);
    Ok(Json(render(&state.db, rows, caller, &embeds).await?))
}

pub async fn create_folder(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Json(req): Json<CreateFolderRequest>,
) -> Result<(StatusCode, Json<FolderResponse>), AppError> {
    let caller = ctx.require_identity()?;
    req.validate().map_err(invalid)?;

    if let Some(parent_id) = req.parent_id {
        load_owned(&state.db, &ctx, caller, parent_id).await?;
    }

    let row = folder_repo::create(
        &state.db,
        caller.id,
        req.name.trim(),
        req.color.as_deref(),
        req.parent_id,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(FolderResponse::from(row))))
}

pub async fn get_folder(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(folder_id): Path<i64>,
) -> Result<Json<FolderResponse>, AppError> {
    let caller = ctx.require_identity()?;
    let row = load_owned(&state.db, &ctx, caller, folder_id).await?;

    let embeds = ctx.embeds(ResourceKind::Folder);
    render(&state.db, vec![row], caller, &embeds)
        .await?
        .pop()
        .map(Json)
        .ok_or(AppError::Internal)
}

/// Put a bookmark into a folder. Both must belong to the caller.
pub async fn add_bookmark(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path((folder_id, bookmark_id)): Path<(i64, i64)>,
) -> Result<StatusCode, AppError> {
    let caller = ctx.require_identity()?;
    load_owned(&state.db, &ctx, caller, folder_id).await?;
    bookmarks::load_owned(&state.db, &ctx, caller, bookmark_id).await?;

    folder_repo::add_bookmark(&state.db, folder_id, bookmark_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
