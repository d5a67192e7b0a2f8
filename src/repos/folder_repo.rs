/*
 * Responsibility
 * - folders CRUD and bookmark membership
 * - parent / bookmarks lookups used when a client embeds them
 */
use sqlx::PgPool;

use crate::repos::bookmark_repo::BookmarkRow;
use crate::repos::error::RepoResult;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FolderRow {
    pub id: i64,
    pub name: String,
    pub color: Option<String>,
    pub parent_id: Option<i64>,
    pub owner_id: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct FolderBookmarkRow {
    pub folder_id: i64,
    #[sqlx(flatten)]
    pub bookmark: BookmarkRow,
}

pub async fn list_by_owner(pool: &PgPool, owner_id: i64) -> RepoResult<Vec<FolderRow>> {
    let rows = sqlx::query_as::<_, FolderRow>(
        r#"
        SELECT id, name, color, parent_id, owner_id
        FROM folders
        WHERE owner_id = $1
        ORDER BY id
        "#,
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn get(pool: &PgPool, id: i64) -> RepoResult<Option<FolderRow>> {
    let row = sqlx::query_as::<_, FolderRow>(
        r#"
        SELECT id, name, color, parent_id, owner_id
        FROM folders
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn get_many(pool: &PgPool, ids: &[i64]) -> RepoResult<Vec<FolderRow>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, FolderRow>(
        r#"
        SELECT id, name, color, parent_id, owner_id
        FROM folders
        WHERE id = ANY($1)
        "#,
    )
    .bind(ids)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn create(
    pool: &PgPool,
    owner_id: i64,
    name: &str,
    color: Option<&str>,
    parent_id: Option<i64>,
) -> RepoResult<FolderRow> {
    let row = sqlx::query_as::<_, FolderRow>(
        r#"
        INSERT INTO folders (name, color, parent_id, owner_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id, name, color, parent_id, owner_id
        "#,
    )
    .bind(name)
    .bind(color)
    .bind(parent_id)
    .bind(owner_id)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

// Idempotent: adding a bookmark twice is not an error.
pub async fn add_bookmark(pool: &PgPool, folder_id: i64, bookmark_id: i64) -> RepoResult<()> {
    sqlx::query(
        r#"
        INSERT INTO bookmark_folder (bookmark_id, folder_id)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(bookmark_id)
    .bind(folder_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn bookmarks_for(pool: &PgPool, folder_ids: &[i64]) -> RepoResult<Vec<FolderBookmarkRow>> {
    if folder_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, FolderBookmarkRow>(
        r#"
        SELECT bf.folder_id, b.id, b.name, b.url, b.color, b.owner_id, b.created_at, b.updated_at
        FROM bookmark_folder bf
        JOIN bookmarks b ON b.id = bf.bookmark_id
        WHERE bf.folder_id = ANY($1)
        ORDER BY b.id
        "#,
    )
    .bind(folder_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
