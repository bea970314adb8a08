use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::response::ApiError;
use crate::api::wire::StatsResponse;
use crate::storage::RecordStore;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub success: bool,
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PurgeResponse {
    pub success: bool,
    pub files_deleted: u64,
    pub reactions_deleted: u64,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<StatsResponse>, ApiError> {
    let stats = state.store.get_aggregate_stats().await?;

    Ok(Json(StatsResponse {
        success: true,
        stats,
    }))
}

pub async fn admin_purge(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PurgeResponse>, ApiError> {
    let stats = state.store.purge_all().await?;

    tracing::warn!(
        files = stats.files,
        reactions = stats.reactions,
        "Purged all data"
    );

    Ok(Json(PurgeResponse {
        success: true,
        files_deleted: stats.files,
        reactions_deleted: stats.reactions,
    }))
}
