//! Shared test helpers for handler tests.

use std::sync::Arc;

use crate::api::wire::{UploadFileData, UploadRequest};
use crate::config::{Config, ServerConfig};
use crate::storage::models::NewFile;
use crate::storage::{RecordStore, SqlStore};
use crate::AppState;

/// Create a test AppState backed by a SQLite database in a temporary directory.
pub async fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    let data_dir = temp_dir.path().join("data");

    let config = Config {
        server: ServerConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: data_dir.to_string_lossy().to_string(),
            database_url: None,
        },
        test_mode: true,
        ..Config::default()
    };

    let store = SqlStore::open(&data_dir)
        .await
        .expect("Failed to open test database");

    Arc::new(AppState { config, store })
}

pub fn text_file(name: &str, text: &str) -> NewFile {
    NewFile {
        name: name.to_string(),
        mime_type: "text/plain".to_string(),
        size_bytes: text.len() as u64,
        content: format!("data:text/plain,{text}"),
        text_content: Some(text.to_string()),
        caption: None,
    }
}

/// Insert one text file directly into the store and return its id.
pub async fn seed_file(state: &AppState) -> String {
    state
        .store
        .insert_file(text_file("seed.txt", "seed"), "user_seed")
        .await
        .expect("Failed to seed file")
}

pub fn upload_request(name: &str, mime_type: &str, caption: Option<&str>) -> UploadRequest {
    let data = UploadFileData {
        name: name.to_string(),
        mime_type: mime_type.to_string(),
        size: 4,
        content: format!("data:{mime_type};base64,dGVzdA=="),
        text_content: None,
    };

    UploadRequest {
        file_data: serde_json::to_string(&data).expect("Failed to encode fileData"),
        caption: caption.map(str::to_string),
        uploader_id: Some("user_test".to_string()),
    }
}
