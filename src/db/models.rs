use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(rename = "isFolder")]
    pub is_folder: bool,
    #[serde(rename = "parentId")]
    pub parent_id: Option<String>,  // None = top level
    #[serde(rename = "sortOrder")]
    pub sort_order: i64,            // Larger sorts first; defaults to creation time
    #[serde(rename = "isDeleted")]
    pub is_deleted: bool,
    #[serde(rename = "deletedAt")]
    pub deleted_at: i64,            // 0 = never deleted
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
}

/// Partial update for a node. Fields left as None keep their current value.
/// For parent_id the outer Option means "change it or not", the inner one is
/// the new value (None = move to top level).
#[derive(Debug, Clone, Default)]
pub struct NodePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub parent_id: Option<Option<String>>,
    pub sort_order: Option<i64>,
    pub is_deleted: Option<bool>,
}

/// Singleton UI preferences row sharing the store file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub theme: String,
    #[serde(rename = "editorOpts")]
    pub editor_opts: Option<String>,
    #[serde(rename = "syncEnabled")]
    pub sync_enabled: bool,
    #[serde(rename = "syncEndpoint")]
    pub sync_endpoint: Option<String>,
}
