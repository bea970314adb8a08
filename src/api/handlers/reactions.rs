use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;

use crate::api::response::{ApiError, AppJson};
use crate::api::wire::{ReactionRequest, ReactionResponse, ReactionsResponse};
use crate::storage::models::Reaction;
use crate::storage::RecordStore;
use crate::AppState;

pub async fn apply_reaction(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
    AppJson(req): AppJson<ReactionRequest>,
) -> Result<Json<ReactionResponse>, ApiError> {
    let reaction: Reaction = req.reaction.parse()?;
    if req.user_id.trim().is_empty() {
        return Err(ApiError::bad_request("userId must not be empty"));
    }

    let outcome = state
        .store
        .apply_reaction(&file_id, &req.user_id, reaction)
        .await?;

    tracing::debug!(
        file_id = %file_id,
        user_id = %req.user_id,
        state = ?outcome.state,
        likes = outcome.likes,
        dislikes = outcome.dislikes,
        "Applied reaction"
    );

    Ok(Json(ReactionResponse {
        success: true,
        reaction: outcome.state.reaction(),
        like_delta: outcome.like_delta,
        dislike_delta: outcome.dislike_delta,
        likes: outcome.likes,
        dislikes: outcome.dislikes,
    }))
}

pub async fn user_reactions(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<ReactionsResponse>, ApiError> {
    let reactions = state.store.get_reactions_for_user(&user_id).await?;

    Ok(Json(ReactionsResponse {
        success: true,
        reactions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{seed_file, test_state};
    use axum::http::StatusCode;

    fn request(reaction: &str, user_id: &str) -> AppJson<ReactionRequest> {
        AppJson(ReactionRequest {
            reaction: reaction.to_string(),
            user_id: user_id.to_string(),
        })
    }

    #[tokio::test]
    async fn like_toggle_and_switch() {
        let temp_dir = tempfile::tempdir().unwrap();
        let state = test_state(&temp_dir).await;
        let file_id = seed_file(&state).await;

        let Json(liked) = apply_reaction(
            State(Arc::clone(&state)),
            Path(file_id.clone()),
            request("like", "user_a"),
        )
        .await
        .unwrap();
        assert_eq!(liked.reaction, Some(Reaction::Like));
        assert_eq!((liked.likes, liked.dislikes), (1, 0));

        let Json(switched) = apply_reaction(
            State(Arc::clone(&state)),
            Path(file_id.clone()),
            request("dislike", "user_a"),
        )
        .await
        .unwrap();
        assert_eq!(switched.reaction, Some(Reaction::Dislike));
        assert_eq!((switched.like_delta, switched.dislike_delta), (-1, 1));
        assert_eq!((switched.likes, switched.dislikes), (0, 1));

        let Json(cleared) = apply_reaction(
            State(Arc::clone(&state)),
            Path(file_id.clone()),
            request("dislike", "user_a"),
        )
        .await
        .unwrap();
        assert_eq!(cleared.reaction, None);
        assert_eq!((cleared.likes, cleared.dislikes), (0, 0));

        let Json(reactions) = user_reactions(State(state), Path("user_a".to_string()))
            .await
            .unwrap();
        assert!(reactions.reactions.is_empty());
    }

    #[tokio::test]
    async fn unknown_reaction_is_bad_request() {
        let temp_dir = tempfile::tempdir().unwrap();
        let state = test_state(&temp_dir).await;
        let file_id = seed_file(&state).await;

        let err = apply_reaction(State(state), Path(file_id), request("love", "user_a"))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reaction_on_unknown_file_is_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let state = test_state(&temp_dir).await;

        let err = apply_reaction(
            State(state),
            Path("file_missing".to_string()),
            request("like", "user_a"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
