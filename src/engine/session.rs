use crate::storage::models::generate_user_id;
use crate::storage::{LocalStore, StoreError, USER_ID_KEY};

/// The anonymous user on whose behalf engine operations run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    user_id: String,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    /// Reuse the user id persisted in the local store, or mint and persist a new one.
    pub fn load_or_create(local: &LocalStore) -> Result<Self, StoreError> {
        if let Some(user_id) = local.load_value::<String>(USER_ID_KEY)? {
            return Ok(Self::new(user_id));
        }

        let user_id = generate_user_id();
        local.store_value(USER_ID_KEY, &user_id)?;
        tracing::info!(user_id = %user_id, "Created local user id");
        Ok(Self::new(user_id))
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}
