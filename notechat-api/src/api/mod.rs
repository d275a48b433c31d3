pub mod chat;
pub mod health;
pub mod models;
pub mod notes;
pub mod users;

use notechat_sdk::{ApiKey, Provider};

use crate::app::AppState;
use crate::models::error::{ApiError, ApiResult};
use crate::models::user::User;

const PROFILE_REQUIRED: &str = "User profile not found. Please create your profile first.";

/// The caller's profile, created empty on first access
pub(crate) async fn ensure_user(state: &AppState, subject: &str) -> ApiResult<User> {
    if let Some(user) = state.users.find_by_subject(subject).await? {
        return Ok(user);
    }

    let user = User::new(subject);
    if let Err(e) = state.users.insert(&user).await {
        // A concurrent first request may have created the profile meanwhile.
        return match state.users.find_by_subject(subject).await? {
            Some(existing) => Ok(existing),
            None => Err(e.into()),
        };
    }
    Ok(user)
}

/// The caller's profile, which must already exist
pub(crate) async fn require_user(state: &AppState, subject: &str) -> ApiResult<User> {
    state
        .users
        .find_by_subject(subject)
        .await?
        .ok_or_else(|| ApiError::NotFound(PROFILE_REQUIRED.into()))
}

pub(crate) fn require_key(user: &User, provider: Provider) -> ApiResult<ApiKey> {
    user.api_key(provider)
        .cloned()
        .ok_or(ApiError::MissingApiKey(provider))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Settings;
    use crate::core::storage::{Stores, UserStore};
    use async_trait::async_trait;
    use mockall::{Sequence, mock};
    use notechat_sdk::mock::{InMemoryMemoryStore, MockCompletionBackend};
    use std::sync::Arc;
    use uuid::Uuid;

    mock! {
        Users {}

        #[async_trait]
        impl UserStore for Users {
            async fn find_by_subject(&self, subject: &str) -> anyhow::Result<Option<User>>;
            async fn insert(&self, user: &User) -> anyhow::Result<()>;
            async fn replace(&self, user: &User) -> anyhow::Result<()>;
            async fn set_api_key(
                &self,
                subject: &str,
                provider: Provider,
                key: Option<ApiKey>,
            ) -> anyhow::Result<bool>;
            async fn add_note_ref(&self, user_id: Uuid, note_id: Uuid) -> anyhow::Result<()>;
            async fn remove_note_ref(&self, user_id: Uuid, note_id: Uuid) -> anyhow::Result<()>;
        }
    }

    fn state(users: MockUsers) -> AppState {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(dir.path(), "test").unwrap();
        let stores = Stores {
            users: Arc::new(users),
            ..Stores::in_memory()
        };

        AppState::with_collaborators(
            settings,
            stores,
            Arc::new(MockCompletionBackend::default()),
            Arc::new(InMemoryMemoryStore::new()),
        )
        .unwrap()
    }

    /// Lookup misses, insert loses the race against another request
    fn racing_users(reread: Option<User>) -> MockUsers {
        let mut users = MockUsers::new();
        let mut seq = Sequence::new();

        users
            .expect_find_by_subject()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(None));
        users
            .expect_insert()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|user| anyhow::bail!("User already exists: {}", user.auth_subject));
        users
            .expect_find_by_subject()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(reread.clone()));
        users
    }

    #[tokio::test]
    async fn test_ensure_user_returns_concurrently_created_profile() {
        let winner = User::new("user_abc");
        let state = state(racing_users(Some(winner.clone())));

        let user = ensure_user(&state, "user_abc").await.unwrap();
        assert_eq!(user.id, winner.id);
    }

    #[tokio::test]
    async fn test_ensure_user_insert_failure_without_profile() {
        let state = state(racing_users(None));

        let err = ensure_user(&state, "user_abc").await.unwrap_err();
        assert!(matches!(err, ApiError::Database));
    }
}
