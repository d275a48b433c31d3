use chrono::{DateTime, Utc};
use notechat_sdk::{MemoryRecord, Provider, Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const TITLE_MAX_CHARS: usize = 50;
const TITLE_ELLIPSIS: &str = "...";

/// Session title from the first message: unchanged up to 50 characters,
/// otherwise the first 47 followed by `...`.
pub fn derive_title(message: &str) -> String {
    if message.chars().count() <= TITLE_MAX_CHARS {
        return message.to_string();
    }

    let keep = TITLE_MAX_CHARS - TITLE_ELLIPSIS.len();
    let mut title: String = message.chars().take(keep).collect();
    title.push_str(TITLE_ELLIPSIS);
    title
}

/// Rolling summary of one conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: Uuid,
    pub session_id: String,
    pub user_id: Uuid,
    pub auth_subject: String,
    pub title: String,
    pub provider: Provider,
    pub model: String,
    pub message_count: u32,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn start(
        session_id: impl Into<String>,
        user_id: Uuid,
        auth_subject: impl Into<String>,
        provider: Provider,
        model: impl Into<String>,
        first_message: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            user_id,
            auth_subject: auth_subject.into(),
            title: derive_title(first_message),
            provider,
            model: model.into(),
            message_count: 1,
            last_activity: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Count one more turn
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.message_count += 1;
        self.last_activity = now;
        self.updated_at = now;
    }
}

/// One entry of the append-only message log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: String,
    pub user_id: Uuid,
    pub auth_subject: String,
    pub role: Role,
    pub content: String,
    pub provider: Provider,
    pub model: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub memory_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(
        session: &ChatSession,
        role: Role,
        content: impl Into<String>,
        memory_ids: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session.session_id.clone(),
            user_id: session.user_id,
            auth_subject: session.auth_subject.clone(),
            role,
            content: content.into(),
            provider: session.provider,
            model: session.model.clone(),
            memory_ids,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: String,
    /// Provider tag, `openai` or `gemini`
    pub model: String,
    #[serde(default)]
    pub model_id: Option<String>,
}

/// Result of one chat turn
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub session_id: String,
    pub message: String,
    pub role: Role,
    /// Provider tag
    pub model: Provider,
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub memories: Vec<MemoryRecord>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub data: ChatReply,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionList {
    pub message: String,
    pub sessions: Vec<ChatSession>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHistory {
    pub message: String,
    pub session_id: String,
    pub messages: Vec<ChatMessage>,
    pub count: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNoteWithChatRequest {
    pub note_id: String,
    pub session_id: String,
    /// Provider tag, `openai` or `gemini`
    pub model: String,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}
