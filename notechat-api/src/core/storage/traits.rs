//! Storage trait definitions
//!
//! Every read and write that touches a user-owned entity is scoped by the
//! owner, so a caller holding a foreign id sees "not found".

use anyhow::Result;
use async_trait::async_trait;
use notechat_sdk::{ApiKey, Provider};
use uuid::Uuid;

use crate::models::chat::{ChatMessage, ChatSession};
use crate::models::note::{Note, NotePatch};
use crate::models::user::User;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_subject(&self, subject: &str) -> Result<Option<User>>;

    async fn insert(&self, user: &User) -> Result<()>;

    /// Replace the stored user with the same subject
    async fn replace(&self, user: &User) -> Result<()>;

    /// Set or clear one provider key. Returns whether a user matched.
    async fn set_api_key(
        &self,
        subject: &str,
        provider: Provider,
        key: Option<ApiKey>,
    ) -> Result<bool>;

    /// Add a note reference if not already present
    async fn add_note_ref(&self, user_id: Uuid, note_id: Uuid) -> Result<()>;

    async fn remove_note_ref(&self, user_id: Uuid, note_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn insert(&self, note: &Note) -> Result<()>;

    async fn find(&self, note_id: Uuid, user_id: Uuid) -> Result<Option<Note>>;

    /// Apply a patch and bump `updated_at`; `None` when no owned note matched
    async fn update(&self, note_id: Uuid, user_id: Uuid, patch: NotePatch)
    -> Result<Option<Note>>;

    async fn delete(&self, note_id: Uuid, user_id: Uuid) -> Result<bool>;

    /// The user's referenced notes, in reference order
    async fn list_for_user(&self, user: &User) -> Result<Vec<Note>>;
}

/// Session summaries plus the append-only message log.
///
/// The two are written independently; there is no transaction linking a
/// session update to the message appended alongside it.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn find_session(&self, session_id: &str) -> Result<Option<ChatSession>>;

    async fn insert_session(&self, session: &ChatSession) -> Result<()>;

    async fn replace_session(&self, session: &ChatSession) -> Result<()>;

    /// Sessions of a subject, most recent activity first
    async fn list_sessions(&self, subject: &str) -> Result<Vec<ChatSession>>;

    async fn append_message(&self, message: &ChatMessage) -> Result<()>;

    /// Messages of a subject's session, oldest first
    async fn messages(&self, session_id: &str, subject: &str) -> Result<Vec<ChatMessage>>;

    /// Delete a subject's session and its messages
    async fn delete_session(&self, session_id: &str, subject: &str) -> Result<bool>;
}
