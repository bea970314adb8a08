use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Uploads arrive as data URIs inside a JSON envelope, so allow for base64 growth.
    let upload_limit = (state.config.max_upload_size as usize).saturating_mul(2);

    let mut router = Router::new()
        // Files
        .route("/files", get(handlers::list_files))
        .route("/files/:id", get(handlers::get_file))
        .route("/files/:id", delete(handlers::delete_file))
        .route("/files/:id/view", post(handlers::record_view))
        .route(
            "/upload",
            post(handlers::upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        // Reactions
        .route("/files/:id/reaction", post(handlers::apply_reaction))
        .route("/reactions/:user_id", get(handlers::user_reactions))
        // Stats
        .route("/stats", get(handlers::stats))
        // Internal
        .route("/_internal/health", get(handlers::health));

    // Test-only routes
    if state.config.test_mode {
        tracing::warn!("Test mode enabled, purge route is available");
        router = router.route("/admin/purge", delete(handlers::admin_purge));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
