use std::collections::HashMap;
use std::sync::Arc;

use super::selector::{AvailabilitySelector, Served};
use super::session::Session;
use crate::storage::models::{Reaction, ReactionOutcome};
use crate::storage::StoreError;

/// Likes and dislikes, routed to whichever backend the selector picks.
pub struct ReactionEngine {
    selector: Arc<AvailabilitySelector>,
}

impl ReactionEngine {
    pub fn new(selector: Arc<AvailabilitySelector>) -> Self {
        Self { selector }
    }

    /// Move the session user's reaction on `file_id` through the state machine.
    pub async fn apply_reaction(
        &self,
        session: &Session,
        file_id: &str,
        reaction: Reaction,
    ) -> Result<Served<ReactionOutcome>, StoreError> {
        let user_id = session.user_id();
        let served = self
            .selector
            .execute("apply_reaction", move |store| async move {
                store.apply_reaction(file_id, user_id, reaction).await
            })
            .await?;

        tracing::debug!(
            file_id,
            user_id,
            backend = ?served.backend,
            state = ?served.value.state,
            likes = served.value.likes,
            dislikes = served.value.dislikes,
            "Reaction applied"
        );
        Ok(served)
    }

    /// The session user's reactions, keyed by file id.
    pub async fn reactions_for(
        &self,
        session: &Session,
    ) -> Result<Served<HashMap<String, Reaction>>, StoreError> {
        let user_id = session.user_id();
        self.selector
            .execute("get_reactions_for_user", move |store| async move {
                store.get_reactions_for_user(user_id).await
            })
            .await
    }
}
