use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StoreError;
use crate::state_machine::ReactionState;

/// Default per-file upload limit (10MB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// A like or dislike placed by one user on one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reaction {
    Dislike,
    Like,
}

impl Reaction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reaction::Dislike => "dislike",
            Reaction::Like => "like",
        }
    }
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reaction {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Reaction::Like),
            "dislike" => Ok(Reaction::Dislike),
            other => Err(StoreError::InvalidArgument(format!(
                "invalid reaction '{other}', expected 'like' or 'dislike'"
            ))),
        }
    }
}

/// Classification of an allow-listed MIME type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Document,
    Image,
    Text,
}

impl FileCategory {
    /// Category of an allow-listed MIME type, `None` for anything not accepted for upload.
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        match mime_type {
            "image/png" | "image/jpeg" | "image/jpg" => Some(FileCategory::Image),
            "text/plain" => Some(FileCategory::Text),
            "application/pdf"
            | "application/msword"
            | "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            | "application/vnd.ms-excel"
            | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            | "application/vnd.ms-powerpoint"
            | "application/vnd.openxmlformats-officedocument.presentationml.presentation" => {
                Some(FileCategory::Document)
            }
            _ => None,
        }
    }
}

/// A shared file with its engagement counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    /// Opaque payload, usually a data URI or raw text
    pub content: String,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub views: u64,
    pub likes: u64,
    pub dislikes: u64,
    pub uploader_id: String,
}

impl FileRecord {
    /// Build a fresh record for an upload: new id, current timestamp, zeroed counters.
    pub fn from_upload(file: NewFile, uploader_id: &str) -> Self {
        Self {
            id: generate_file_id(),
            name: file.name,
            mime_type: file.mime_type,
            size_bytes: file.size_bytes,
            content: file.content,
            text_content: file.text_content,
            caption: file.caption.filter(|c| !c.trim().is_empty()),
            uploaded_at: Utc::now(),
            views: 0,
            likes: 0,
            dislikes: 0,
            uploader_id: uploader_id.to_string(),
        }
    }

    pub fn category(&self) -> Option<FileCategory> {
        FileCategory::from_mime(&self.mime_type)
    }
}

/// Upload payload before an id has been assigned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFile {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub content: String,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

impl NewFile {
    /// Fill in an empty MIME type from the file name's extension.
    pub fn resolve_mime_type(&mut self) {
        if self.mime_type.trim().is_empty() {
            if let Some(guess) = mime_guess::from_path(&self.name).first() {
                self.mime_type = guess.essence_str().to_string();
            }
        }
    }

    /// Check the upload against the type/size allow-list.
    pub fn validate(&self, max_size: u64) -> Result<FileCategory, StoreError> {
        if self.name.trim().is_empty() {
            return Err(StoreError::InvalidArgument(
                "file name must not be empty".to_string(),
            ));
        }

        let category = FileCategory::from_mime(&self.mime_type).ok_or_else(|| {
            StoreError::InvalidArgument(format!(
                "file type '{}' is not supported",
                self.mime_type
            ))
        })?;

        if self.size_bytes > max_size {
            return Err(StoreError::InvalidArgument(format!(
                "file size {} exceeds the {} byte limit",
                self.size_bytes, max_size
            )));
        }

        Ok(category)
    }
}

/// The at-most-one reaction a user holds on a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionRecord {
    pub user_id: String,
    pub file_id: String,
    pub reaction: Reaction,
}

/// Totals across every stored file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total_files: u64,
    pub total_views: u64,
    pub total_likes: u64,
}

impl AggregateStats {
    pub fn from_files<'a>(files: impl IntoIterator<Item = &'a FileRecord>) -> Self {
        files
            .into_iter()
            .fold(AggregateStats::default(), |mut stats, file| {
                stats.total_files += 1;
                stats.total_views += file.views;
                stats.total_likes += file.likes;
                stats
            })
    }
}

/// Result of one committed reaction transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionOutcome {
    pub state: ReactionState,
    pub like_delta: i64,
    pub dislike_delta: i64,
    /// Counters on the file after commit
    pub likes: u64,
    pub dislikes: u64,
}

/// `file_<unix millis>_<9 random chars>`
pub fn generate_file_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("file_{}_{}", Utc::now().timestamp_millis(), &suffix[..9])
}

/// `user_<12 random chars>`
pub fn generate_user_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("user_{}", &suffix[..12])
}
