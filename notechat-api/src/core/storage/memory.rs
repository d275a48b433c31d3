//! In-memory storage implementations
//!
//! These implementations store data in memory using thread-safe data structures.
//! Data is lost when the process exits.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use notechat_sdk::{ApiKey, Provider};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::chat::{ChatMessage, ChatSession};
use crate::models::note::{Note, NotePatch};
use crate::models::user::User;

use super::traits::{ChatStore, NoteStore, UserStore};

/// Users keyed by auth subject
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_subject(&self, subject: &str) -> Result<Option<User>> {
        Ok(self.users.read().get(subject).cloned())
    }

    async fn insert(&self, user: &User) -> Result<()> {
        let mut users = self.users.write();
        if users.contains_key(&user.auth_subject) {
            anyhow::bail!("User already exists: {}", user.auth_subject);
        }
        users.insert(user.auth_subject.clone(), user.clone());
        info!("Created user profile: {}", user.id);
        Ok(())
    }

    async fn replace(&self, user: &User) -> Result<()> {
        self.users
            .write()
            .insert(user.auth_subject.clone(), user.clone());
        Ok(())
    }

    async fn set_api_key(
        &self,
        subject: &str,
        provider: Provider,
        key: Option<ApiKey>,
    ) -> Result<bool> {
        let mut users = self.users.write();
        let Some(user) = users.get_mut(subject) else {
            return Ok(false);
        };

        match provider {
            Provider::OpenAi => user.openai_key = key,
            Provider::Gemini => user.gemini_key = key,
        }
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn add_note_ref(&self, user_id: Uuid, note_id: Uuid) -> Result<()> {
        let mut users = self.users.write();
        if let Some(user) = users.values_mut().find(|u| u.id == user_id)
            && !user.note_ids.contains(&note_id)
        {
            user.note_ids.push(note_id);
        }
        Ok(())
    }

    async fn remove_note_ref(&self, user_id: Uuid, note_id: Uuid) -> Result<()> {
        let mut users = self.users.write();
        if let Some(user) = users.values_mut().find(|u| u.id == user_id) {
            user.note_ids.retain(|id| *id != note_id);
        }
        Ok(())
    }
}

/// Notes keyed by id
#[derive(Default)]
pub struct InMemoryNoteStore {
    notes: DashMap<Uuid, Note>,
}

impl InMemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NoteStore for InMemoryNoteStore {
    async fn insert(&self, note: &Note) -> Result<()> {
        self.notes.insert(note.id, note.clone());
        Ok(())
    }

    async fn find(&self, note_id: Uuid, user_id: Uuid) -> Result<Option<Note>> {
        Ok(self
            .notes
            .get(&note_id)
            .filter(|note| note.user_id == user_id)
            .map(|note| note.clone()))
    }

    async fn update(
        &self,
        note_id: Uuid,
        user_id: Uuid,
        patch: NotePatch,
    ) -> Result<Option<Note>> {
        match self.notes.get_mut(&note_id) {
            Some(mut note) if note.user_id == user_id => {
                note.apply(patch);
                Ok(Some(note.clone()))
            },
            _ => Ok(None),
        }
    }

    async fn delete(&self, note_id: Uuid, user_id: Uuid) -> Result<bool> {
        Ok(self
            .notes
            .remove_if(&note_id, |_, note| note.user_id == user_id)
            .is_some())
    }

    async fn list_for_user(&self, user: &User) -> Result<Vec<Note>> {
        Ok(user
            .note_ids
            .iter()
            .filter_map(|id| self.notes.get(id).map(|note| note.clone()))
            .filter(|note| note.user_id == user.id)
            .collect())
    }
}

// ============================================================================
// InMemoryChatStore
// ============================================================================

/// Sessions keyed by session id, messages in append order
#[derive(Default)]
pub struct InMemoryChatStore {
    sessions: RwLock<HashMap<String, ChatSession>>,
    messages: RwLock<Vec<ChatMessage>>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn find_session(&self, session_id: &str) -> Result<Option<ChatSession>> {
        Ok(self.sessions.read().get(session_id).cloned())
    }

    async fn insert_session(&self, session: &ChatSession) -> Result<()> {
        self.sessions
            .write()
            .insert(session.session_id.clone(), session.clone());
        debug!("Created chat session: {}", session.session_id);
        Ok(())
    }

    async fn replace_session(&self, session: &ChatSession) -> Result<()> {
        let mut sessions = self.sessions.write();
        match sessions.get_mut(&session.session_id) {
            Some(existing) => {
                *existing = session.clone();
                Ok(())
            },
            None => Err(anyhow::anyhow!(
                "Chat session not found: {}",
                session.session_id
            )),
        }
    }

    async fn list_sessions(&self, subject: &str) -> Result<Vec<ChatSession>> {
        let mut sessions: Vec<ChatSession> = self
            .sessions
            .read()
            .values()
            .filter(|s| s.auth_subject == subject)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(sessions)
    }

    async fn append_message(&self, message: &ChatMessage) -> Result<()> {
        self.messages.write().push(message.clone());
        Ok(())
    }

    async fn messages(&self, session_id: &str, subject: &str) -> Result<Vec<ChatMessage>> {
        let mut messages: Vec<ChatMessage> = self
            .messages
            .read()
            .iter()
            .filter(|m| m.session_id == session_id && m.auth_subject == subject)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn delete_session(&self, session_id: &str, subject: &str) -> Result<bool> {
        self.messages
            .write()
            .retain(|m| !(m.session_id == session_id && m.auth_subject == subject));

        let mut sessions = self.sessions.write();
        let owned = sessions
            .get(session_id)
            .is_some_and(|s| s.auth_subject == subject);
        if owned {
            sessions.remove(session_id);
            info!("Deleted chat session: {}", session_id);
        }
        Ok(owned)
    }
}
