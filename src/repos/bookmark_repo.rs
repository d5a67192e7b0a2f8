/*
 * Responsibility
 * - bookmarks CRUD
 * - bookmark_folder lookups used when a client embeds `folders`
 */
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::repos::error::RepoResult;
use crate::repos::folder_repo::FolderRow;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BookmarkRow {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub color: Option<String>,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A folder joined to one of the requested bookmarks.
#[derive(Debug, sqlx::FromRow)]
pub struct BookmarkFolderRow {
    pub bookmark_id: i64,
    #[sqlx(flatten)]
    pub folder: FolderRow,
}

pub async fn list_by_owner(pool: &PgPool, owner_id: i64) -> RepoResult<Vec<BookmarkRow>> {
    let rows = sqlx::query_as::<_, BookmarkRow>(
        r#"
        SELECT id, name, url, color, owner_id, created_at, updated_at
        FROM bookmarks
        WHERE owner_id = $1
        ORDER BY id DESC
        "#,
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn get(pool: &PgPool, id: i64) -> RepoResult<Option<BookmarkRow>> {
    let row = sqlx::query_as::<_, BookmarkRow>(
        r#"
        SELECT id, name, url, color, owner_id, created_at, updated_at
        FROM bookmarks
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn create(
    pool: &PgPool,
    owner_id: i64,
    name: &str,
    url: &str,
    color: Option<&str>,
) -> RepoResult<BookmarkRow> {
    let row = sqlx::query_as::<_, BookmarkRow>(
        r#"
        INSERT INTO bookmarks (name, url, color, owner_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id, name, url, color, owner_id, created_at, updated_at
        "#,
    )
    .bind(name)
    .bind(url)
    .bind(color)
    .bind(owner_id)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn update(
    pool: &PgPool,
    id: i64,
    name: Option<&str>,
    url: Option<&str>,
    color: Option<Option<&str>>,
) -> RepoResult<Option<BookmarkRow>> {
    // color: Some(Some(v)) -> set to v
    // color: Some(None)    -> set to NULL
    // color: None          -> do not update
    let row = sqlx::query_as::<_, BookmarkRow>(
        r#"
        UPDATE bookmarks
        SET
            name = COALESCE($2, name),
            url = COALESCE($3, url),
            color = CASE
                WHEN $4 = false THEN color
                ELSE $5
            END,
            updated_at = now()
        WHERE id = $1
        RETURNING id, name, url, color, owner_id, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(url)
    .bind(color.is_some())
    .bind(color.flatten())
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn delete(pool: &PgPool, id: i64) -> RepoResult<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM bookmarks
        WHERE id = $1
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn folders_for(pool: &PgPool, bookmark_ids: &[i64]) -> RepoResult<Vec<BookmarkFolderRow>> {
    if bookmark_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, BookmarkFolderRow>(
        r#"
        SELECT bf.bookmark_id, f.id, f.name, f.color, f.parent_id, f.owner_id
        FROM bookmark_folder bf
        JOIN folders f ON f.id = bf.folder_id
        WHERE bf.bookmark_id = ANY($1)
        ORDER BY f.id
        "#,
    )
    .bind(bookmark_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
