//! JSON bodies of the HTTP contract, shared by the server handlers and `RemoteStore`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::models::{AggregateStats, FileCategory, FileRecord, NewFile, Reaction};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResponse {
    pub file_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: u64,
    pub content: String,
    pub text_content: Option<String>,
    pub caption: Option<String>,
    pub upload_date: DateTime<Utc>,
    pub views: u64,
    pub likes: u64,
    pub dislikes: u64,
    #[serde(default)]
    pub uploader_id: String,
}

impl From<&FileRecord> for FileResponse {
    fn from(file: &FileRecord) -> Self {
        Self {
            file_id: file.id.clone(),
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            size: file.size_bytes,
            content: file.content.clone(),
            text_content: file.text_content.clone(),
            caption: file.caption.clone(),
            upload_date: file.uploaded_at,
            views: file.views,
            likes: file.likes,
            dislikes: file.dislikes,
            uploader_id: file.uploader_id.clone(),
        }
    }
}

impl From<FileResponse> for FileRecord {
    fn from(file: FileResponse) -> Self {
        Self {
            id: file.file_id,
            name: file.name,
            mime_type: file.mime_type,
            size_bytes: file.size,
            content: file.content,
            text_content: file.text_content,
            caption: file.caption,
            uploaded_at: file.upload_date,
            views: file.views,
            likes: file.likes,
            dislikes: file.dislikes,
            uploader_id: file.uploader_id,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FileListResponse {
    pub success: bool,
    pub files: Vec<FileResponse>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FileEnvelope {
    pub success: bool,
    pub file: FileResponse,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ListFilesParams {
    #[serde(default)]
    pub category: Option<FileCategory>,
}

/// The inner `fileData` document of an upload, camelCase as browsers send it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadFileData {
    pub name: String,
    #[serde(rename = "type", default)]
    pub mime_type: String,
    pub size: u64,
    pub content: String,
    #[serde(rename = "textContent", default)]
    pub text_content: Option<String>,
}

impl UploadFileData {
    pub fn into_new_file(self, caption: Option<String>) -> NewFile {
        NewFile {
            name: self.name,
            mime_type: self.mime_type,
            size_bytes: self.size,
            content: self.content,
            text_content: self.text_content,
            caption,
        }
    }
}

impl From<&NewFile> for UploadFileData {
    fn from(file: &NewFile) -> Self {
        Self {
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            size: file.size_bytes,
            content: file.content.clone(),
            text_content: file.text_content.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UploadRequest {
    /// JSON-encoded `UploadFileData`
    #[serde(rename = "fileData")]
    pub file_data: String,
    #[serde(default)]
    pub caption: Option<String>,
    /// Anonymous uploader; the server generates one when absent.
    #[serde(rename = "uploaderId", default)]
    pub uploader_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(rename = "fileId")]
    pub file_id: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ViewResponse {
    pub success: bool,
    pub views: u64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ReactionRequest {
    /// Kept as a string so unknown values are reported as a bad request.
    pub reaction: String,
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ReactionResponse {
    pub success: bool,
    /// Reaction held after the call, `null` when toggled off
    pub reaction: Option<Reaction>,
    pub like_delta: i64,
    pub dislike_delta: i64,
    pub likes: u64,
    pub dislikes: u64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ReactionsResponse {
    pub success: bool,
    pub reactions: HashMap<String, Reaction>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub stats: AggregateStats,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}
