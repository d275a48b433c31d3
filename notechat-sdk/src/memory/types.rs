//! Wire types for the memory service

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::types::Role;

/// One stored memory, as returned by the memory service.
///
/// Only `id` and `memory` are guaranteed; everything else depends on the
/// endpoint and on how the record was created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    /// Memory content
    #[serde(default)]
    pub memory: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default)]
    pub immutable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl MemoryRecord {
    /// Minimal record, mostly useful for tests and doubles
    pub fn new(id: impl Into<String>, memory: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            memory: memory.into(),
            user_id: None,
            run_id: None,
            agent_id: None,
            app_id: None,
            hash: None,
            metadata: None,
            categories: Vec::new(),
            immutable: false,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_run(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct AddMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct AddRequest<'a> {
    pub messages: Vec<AddMessage<'a>>,
    pub user_id: &'a str,
    pub run_id: &'a str,
    pub metadata: Value,
    pub infer: bool,
    pub version: &'static str,
}

impl<'a> AddRequest<'a> {
    pub fn chat_message(
        user_id: &'a str,
        session_id: &'a str,
        content: &'a str,
        role: Role,
        timestamp: i64,
    ) -> Self {
        Self {
            messages: vec![AddMessage {
                role: role.as_str(),
                content,
            }],
            user_id,
            run_id: session_id,
            metadata: json!({ "session_id": session_id, "timestamp": timestamp }),
            infer: true,
            version: "v2",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SearchRequest<'a> {
    pub query: &'a str,
    pub filters: Value,
    pub top_k: usize,
    pub rerank: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct GetRequest {
    pub filters: Value,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct BatchDeleteRequest<'a> {
    pub memory_ids: &'a [String],
}

pub(crate) fn user_filter(user_id: &str) -> Value {
    json!({ "user_id": user_id })
}

pub(crate) fn session_filter(user_id: &str, session_id: &str) -> Value {
    json!({ "AND": [{ "user_id": user_id }, { "run_id": session_id }] })
}
