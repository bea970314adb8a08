use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;

use crate::api::response::{ApiError, AppJson, AppQuery};
use crate::api::wire::{
    FileEnvelope, FileListResponse, FileResponse, ListFilesParams, SuccessResponse,
    UploadFileData, UploadRequest, UploadResponse, ViewResponse,
};
use crate::storage::models::generate_user_id;
use crate::storage::RecordStore;
use crate::AppState;

// ============================================================================
// Handlers
// ============================================================================

pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<UploadRequest>,
) -> Result<Json<UploadResponse>, ApiError> {
    let file_data: UploadFileData = serde_json::from_str(&req.file_data)
        .map_err(|e| ApiError::bad_request(format!("Invalid fileData: {e}")))?;

    let mut file = file_data.into_new_file(req.caption);
    file.resolve_mime_type();
    let category = file.validate(state.config.max_upload_size)?;

    let uploader_id = req
        .uploader_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(generate_user_id);

    let file_id = state.store.insert_file(file, &uploader_id).await?;

    tracing::debug!(file_id = %file_id, ?category, uploader_id = %uploader_id, "Uploaded file");
    Ok(Json(UploadResponse {
        success: true,
        file_id,
    }))
}

pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<FileEnvelope>, ApiError> {
    let file = state
        .store
        .get_file(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    Ok(Json(FileEnvelope {
        success: true,
        file: FileResponse::from(&file),
    }))
}

pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.store.delete_file(&id).await?;

    tracing::debug!(file_id = %id, "Deleted file");
    Ok(Json(SuccessResponse { success: true }))
}

pub async fn record_view(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ViewResponse>, ApiError> {
    let views = state.store.increment_views(&id).await?;

    Ok(Json(ViewResponse {
        success: true,
        views,
    }))
}

pub async fn list_files(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<ListFilesParams>,
) -> Result<Json<FileListResponse>, ApiError> {
    let files = state.store.get_all_files().await?;

    let files = files
        .iter()
        .filter(|f| params.category.is_none() || f.category() == params.category)
        .map(FileResponse::from)
        .collect();

    Ok(Json(FileListResponse {
        success: true,
        files,
    }))
}
