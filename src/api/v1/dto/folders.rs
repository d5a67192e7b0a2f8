/*
 * Responsibility
 * - Folders request/response DTOs
 */
use serde::{Deserialize, Serialize};

use crate::api::v1::dto::bookmarks::{BookmarkSummary, validate_color};
use crate::api::v1::dto::users::UserResponse;
use crate::repos::folder_repo::FolderRow;

#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
    pub color: Option<String>,
    pub parent_id: Option<i64>,
}

impl CreateFolderRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("name is required");
        }
        if let Some(color) = &self.color {
            validate_color(color)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderSummary {
    pub id: i64,
    pub name: String,
    pub color: Option<String>,
    pub parent_id: Option<i64>,
}

impl From<&FolderRow> for FolderSummary {
    fn from(row: &FolderRow) -> Self {
        Self {
            id: row.id,
            name: row.name.clone(),
            color: row.color.clone(),
            parent_id: row.parent_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FolderResponse {
    pub id: i64,
    pub name: String,
    pub color: Option<String>,
    pub parent_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<UserResponse>,
    // Outer None: not requested. Some(None): requested, but a root folder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Option<FolderSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bookmarks: Option<Vec<BookmarkSummary>>,
}

impl From<FolderRow> for FolderResponse {
    fn from(row: FolderRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            color: row.color,
            parent_id: row.parent_id,
            owner: None,
            parent: None,
            bookmarks: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> FolderResponse {
        FolderResponse::from(FolderRow {
            id: 4,
            name: "reading".into(),
            color: None,
            parent_id: None,
            owner_id: 1,
        })
    }

    #[test]
    fn requested_root_parent_serializes_as_null() {
        let mut response = root();
        response.parent = Some(None);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["parent"], serde_json::Value::Null);
        assert!(json.as_object().unwrap().contains_key("parent"));
    }

    #[test]
    fn unrequested_parent_is_omitted() {
        let json = serde_json::to_value(root()).unwrap();
        assert!(!json.as_object().unwrap().contains_key("parent"));
    }

    #[test]
    fn blank_name_rejected() {
        let req = CreateFolderRequest {
            name: " ".into(),
            color: None,
            parent_id: None,
        };
        assert!(req.validate().is_err());
    }
}
