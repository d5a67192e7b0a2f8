/*
 * Responsibility
 * - Bookmarks request/response DTOs
 * - Embedded relations are serialized only when they were requested
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::v1::dto::folders::FolderSummary;
use crate::api::v1::dto::nullable;
use crate::api::v1::dto::users::UserResponse;
use crate::repos::bookmark_repo::BookmarkRow;

const MAX_NAME_LEN: usize = 256;
const MAX_COLOR_LEN: usize = 32;

fn validate_name(name: &str) -> Result<(), &'static str> {
    let name = name.trim();
    if name.is_empty() {
        return Err("name is required");
    }
    if name.len() > MAX_NAME_LEN {
        return Err("name must be <= 256 chars");
    }
    Ok(())
}

pub(crate) fn validate_color(color: &str) -> Result<(), &'static str> {
    if color.len() > MAX_COLOR_LEN {
        return Err("color must be <= 32 chars");
    }
    Ok(())
}

fn validate_url(raw: &str) -> Result<(), &'static str> {
    let parsed = url::Url::parse(raw.trim()).map_err(|_| "url is not a valid URL")?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        _ => Err("url must use http or https"),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateBookmarkRequest {
    pub name: String,
    pub url: String,
    pub color: Option<String>,
}

impl CreateBookmarkRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_name(&self.name)?;
        validate_url(&self.url)?;
        if let Some(color) = &self.color {
            validate_color(color)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookmarkRequest {
    pub name: Option<String>,
    pub url: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub color: Option<Option<String>>,
}

impl UpdateBookmarkRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(url) = &self.url {
            validate_url(url)?;
        }
        if let Some(Some(color)) = &self.color {
            validate_color(color)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BookmarkSummary {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub color: Option<String>,
}

impl From<&BookmarkRow> for BookmarkSummary {
    fn from(row: &BookmarkRow) -> Self {
        Self {
            id: row.id,
            name: row.name.clone(),
            url: row.url.clone(),
            color: row.color.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BookmarkResponse {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<UserResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folders: Option<Vec<FolderSummary>>,
}

impl From<BookmarkRow> for BookmarkResponse {
    fn from(row: BookmarkRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            url: row.url,
            color: row.color,
            created_at: row.created_at,
            updated_at: row.updated_at,
            owner: None,
            folders: None,
        }
    }
}
