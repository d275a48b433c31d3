//! Neo4j storage implementations
//!
//! Labels are prefixed with "Notechat" to avoid conflicts with other applications.
//!
//! ## Schema
//!
//! ```cypher
//! (:NotechatUser {
//!     id: String,
//!     auth_subject: String,
//!     email: String, username: String, first_name: String, last_name: String,
//!     openai_key: String,   // "" when unset
//!     gemini_key: String,
//!     note_ids: [String],   // creation order
//!     created_at: String, updated_at: String
//! })
//!
//! (:NotechatNote { id, title, content, user_id, created_at, updated_at })
//!
//! (:NotechatSession {
//!     id, session_id, user_id, auth_subject, title, provider, model,
//!     message_count: Int, last_activity, created_at, updated_at
//! })
//!
//! (:NotechatMessage {
//!     id, session_id, user_id, auth_subject, role, content, provider, model,
//!     memory_ids: [String], created_at
//! })
//! ```
//!
//! Timestamps are RFC 3339 strings so they sort lexically.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neo4rs::{Graph, Node, query};
use notechat_sdk::{ApiKey, Provider, Role};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::config::Neo4jSettings;
use crate::models::chat::{ChatMessage, ChatSession};
use crate::models::note::{Note, NotePatch};
use crate::models::user::User;

use super::traits::{ChatStore, NoteStore, UserStore};

/// Neo4j client wrapper
#[derive(Clone)]
pub struct Neo4jClient {
    graph: Arc<Graph>,
}

impl Neo4jClient {
    pub async fn new(settings: &Neo4jSettings) -> Result<Self> {
        info!("Connecting to Neo4j at {}", settings.uri);

        let graph = Graph::new(&settings.uri, &settings.user, &settings.password).await?;

        let client = Self {
            graph: Arc::new(graph),
        };
        client.init_schema().await?;

        info!("Connected to Neo4j successfully");
        Ok(client)
    }

    async fn init_schema(&self) -> Result<()> {
        let constraints = [
            "CREATE CONSTRAINT notechat_user_id IF NOT EXISTS FOR (u:NotechatUser) REQUIRE u.id IS UNIQUE",
            "CREATE CONSTRAINT notechat_user_subject IF NOT EXISTS FOR (u:NotechatUser) REQUIRE u.auth_subject IS UNIQUE",
            "CREATE CONSTRAINT notechat_note_id IF NOT EXISTS FOR (n:NotechatNote) REQUIRE n.id IS UNIQUE",
            "CREATE CONSTRAINT notechat_session_id IF NOT EXISTS FOR (s:NotechatSession) REQUIRE s.session_id IS UNIQUE",
            "CREATE CONSTRAINT notechat_message_id IF NOT EXISTS FOR (m:NotechatMessage) REQUIRE m.id IS UNIQUE",
        ];

        for constraint in constraints {
            if let Err(e) = self.graph.run(query(constraint)).await {
                debug!("Constraint creation result: {:?}", e);
            }
        }

        info!("Neo4j schema initialized for Notechat");
        Ok(())
    }
}

// ============================================================================
// Neo4jUserStore
// ============================================================================

pub struct Neo4jUserStore {
    client: Neo4jClient,
}

impl Neo4jUserStore {
    pub fn new(client: Neo4jClient) -> Self {
        Self { client }
    }
}

const USER_PROPS: &str = "u.email = $email,
    u.username = $username,
    u.first_name = $first_name,
    u.last_name = $last_name,
    u.openai_key = $openai_key,
    u.gemini_key = $gemini_key,
    u.note_ids = $note_ids,
    u.created_at = $created_at,
    u.updated_at = $updated_at";

fn user_query(cypher: &str, user: &User) -> neo4rs::Query {
    query(cypher)
        .param("id", user.id.to_string())
        .param("auth_subject", user.auth_subject.clone())
        .param("email", user.email.clone())
        .param("username", user.username.clone())
        .param("first_name", user.first_name.clone())
        .param("last_name", user.last_name.clone())
        .param("openai_key", key_value(user.openai_key.as_ref()))
        .param("gemini_key", key_value(user.gemini_key.as_ref()))
        .param("note_ids", ids_value(&user.note_ids))
        .param("created_at", user.created_at.to_rfc3339())
        .param("updated_at", user.updated_at.to_rfc3339())
}

#[async_trait]
impl UserStore for Neo4jUserStore {
    async fn find_by_subject(&self, subject: &str) -> Result<Option<User>> {
        let q = query("MATCH (u:NotechatUser {auth_subject: $subject}) RETURN u")
            .param("subject", subject);

        let mut result = self.client.graph.execute(q).await?;
        match result.next().await? {
            Some(row) => Ok(Some(user_from_node(&row.get::<Node>("u")?)?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, user: &User) -> Result<()> {
        let cypher = format!(
            "CREATE (u:NotechatUser {{id: $id, auth_subject: $auth_subject}})
            SET {USER_PROPS}"
        );
        self.client.graph.run(user_query(&cypher, user)).await?;

        info!("Created user profile: {}", user.id);
        Ok(())
    }

    async fn replace(&self, user: &User) -> Result<()> {
        let cypher = format!(
            "MATCH (u:NotechatUser {{auth_subject: $auth_subject}})
            SET {USER_PROPS}
            RETURN u.id AS id"
        );
        let mut result = self.client.graph.execute(user_query(&cypher, user)).await?;

        if result.next().await?.is_none() {
            return Err(anyhow::anyhow!("User not found: {}", user.auth_subject));
        }
        Ok(())
    }

    async fn set_api_key(
        &self,
        subject: &str,
        provider: Provider,
        key: Option<ApiKey>,
    ) -> Result<bool> {
        let cypher = match provider {
            Provider::OpenAi => {
                "MATCH (u:NotechatUser {auth_subject: $subject})
                SET u.openai_key = $key, u.updated_at = $now
                RETURN u.id AS id"
            },
            Provider::Gemini => {
                "MATCH (u:NotechatUser {auth_subject: $subject})
                SET u.gemini_key = $key, u.updated_at = $now
                RETURN u.id AS id"
            },
        };

        let q = query(cypher)
            .param("subject", subject)
            .param("key", key_value(key.as_ref()))
            .param("now", Utc::now().to_rfc3339());

        let mut result = self.client.graph.execute(q).await?;
        Ok(result.next().await?.is_some())
    }

    async fn add_note_ref(&self, user_id: Uuid, note_id: Uuid) -> Result<()> {
        let q = query(
            "MATCH (u:NotechatUser {id: $user_id})
            WHERE NOT $note_id IN coalesce(u.note_ids, [])
            SET u.note_ids = coalesce(u.note_ids, []) + $note_id",
        )
        .param("user_id", user_id.to_string())
        .param("note_id", note_id.to_string());

        self.client.graph.run(q).await?;
        Ok(())
    }

    async fn remove_note_ref(&self, user_id: Uuid, note_id: Uuid) -> Result<()> {
        let q = query(
            "MATCH (u:NotechatUser {id: $user_id})
            SET u.note_ids = [id IN coalesce(u.note_ids, []) WHERE id <> $note_id]",
        )
        .param("user_id", user_id.to_string())
        .param("note_id", note_id.to_string());

        self.client.graph.run(q).await?;
        Ok(())
    }
}

// ============================================================================
// Neo4jNoteStore
// ============================================================================

pub struct Neo4jNoteStore {
    client: Neo4jClient,
}

impl Neo4jNoteStore {
    pub fn new(client: Neo4jClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NoteStore for Neo4jNoteStore {
    async fn insert(&self, note: &Note) -> Result<()> {
        let q = query(
            "CREATE (n:NotechatNote {
                id: $id,
                title: $title,
                content: $content,
                user_id: $user_id,
                created_at: $created_at,
                updated_at: $updated_at
            })",
        )
        .param("id", note.id.to_string())
        .param("title", note.title.clone())
        .param("content", note.content.clone())
        .param("user_id", note.user_id.to_string())
        .param("created_at", note.created_at.to_rfc3339())
        .param("updated_at", note.updated_at.to_rfc3339());

        self.client.graph.run(q).await?;
        debug!("Created note {}", note.id);
        Ok(())
    }

    async fn find(&self, note_id: Uuid, user_id: Uuid) -> Result<Option<Note>> {
        let q = query("MATCH (n:NotechatNote {id: $id, user_id: $user_id}) RETURN n")
            .param("id", note_id.to_string())
            .param("user_id", user_id.to_string());

        let mut result = self.client.graph.execute(q).await?;
        match result.next().await? {
            Some(row) => Ok(Some(note_from_node(&row.get::<Node>("n")?)?)),
            None => Ok(None),
        }
    }

    async fn update(
        &self,
        note_id: Uuid,
        user_id: Uuid,
        patch: NotePatch,
    ) -> Result<Option<Note>> {
        let q = query(
            "MATCH (n:NotechatNote {id: $id, user_id: $user_id})
            SET n.title = coalesce($title, n.title),
                n.content = coalesce($content, n.content),
                n.updated_at = $now
            RETURN n",
        )
        .param("id", note_id.to_string())
        .param("user_id", user_id.to_string())
        .param("title", patch.title)
        .param("content", patch.content)
        .param("now", Utc::now().to_rfc3339());

        let mut result = self.client.graph.execute(q).await?;
        match result.next().await? {
            Some(row) => Ok(Some(note_from_node(&row.get::<Node>("n")?)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, note_id: Uuid, user_id: Uuid) -> Result<bool> {
        let q = query(
            "MATCH (n:NotechatNote {id: $id, user_id: $user_id})
            WITH n, n.id AS id
            DETACH DELETE n
            RETURN count(id) AS deleted",
        )
        .param("id", note_id.to_string())
        .param("user_id", user_id.to_string());

        deleted_count(&self.client, q).await.map(|n| n > 0)
    }

    async fn list_for_user(&self, user: &User) -> Result<Vec<Note>> {
        let q = query(
            "UNWIND range(0, size($ids) - 1) AS idx
            MATCH (n:NotechatNote {id: $ids[idx], user_id: $user_id})
            RETURN n
            ORDER BY idx",
        )
        .param("ids", ids_value(&user.note_ids))
        .param("user_id", user.id.to_string());

        let mut result = self.client.graph.execute(q).await?;
        let mut notes = Vec::new();
        while let Some(row) = result.next().await? {
            notes.push(note_from_node(&row.get::<Node>("n")?)?);
        }
        Ok(notes)
    }
}

// ============================================================================
// Neo4jChatStore
// ============================================================================

pub struct Neo4jChatStore {
    client: Neo4jClient,
}

impl Neo4jChatStore {
    pub fn new(client: Neo4jClient) -> Self {
        Self { client }
    }
}

const SESSION_PROPS: &str = "s.id = $id,
    s.user_id = $user_id,
    s.auth_subject = $auth_subject,
    s.title = $title,
    s.provider = $provider,
    s.model = $model,
    s.message_count = $message_count,
    s.last_activity = $last_activity,
    s.created_at = $created_at,
    s.updated_at = $updated_at";

fn session_query(cypher: &str, session: &ChatSession) -> neo4rs::Query {
    query(cypher)
        .param("id", session.id.to_string())
        .param("session_id", session.session_id.clone())
        .param("user_id", session.user_id.to_string())
        .param("auth_subject", session.auth_subject.clone())
        .param("title", session.title.clone())
        .param("provider", session.provider.as_str())
        .param("model", session.model.clone())
        .param("message_count", i64::from(session.message_count))
        .param("last_activity", session.last_activity.to_rfc3339())
        .param("created_at", session.created_at.to_rfc3339())
        .param("updated_at", session.updated_at.to_rfc3339())
}

#[async_trait]
impl ChatStore for Neo4jChatStore {
    async fn find_session(&self, session_id: &str) -> Result<Option<ChatSession>> {
        let q = query("MATCH (s:NotechatSession {session_id: $session_id}) RETURN s")
            .param("session_id", session_id);

        let mut result = self.client.graph.execute(q).await?;
        match result.next().await? {
            Some(row) => Ok(Some(session_from_node(&row.get::<Node>("s")?)?)),
            None => Ok(None),
        }
    }

    async fn insert_session(&self, session: &ChatSession) -> Result<()> {
        let cypher = format!(
            "CREATE (s:NotechatSession {{session_id: $session_id}})
            SET {SESSION_PROPS}"
        );
        self.client.graph.run(session_query(&cypher, session)).await?;

        debug!("Created chat session: {}", session.session_id);
        Ok(())
    }

    async fn replace_session(&self, session: &ChatSession) -> Result<()> {
        let cypher = format!(
            "MATCH (s:NotechatSession {{session_id: $session_id}})
            SET {SESSION_PROPS}
            RETURN s.session_id AS session_id"
        );
        let mut result = self
            .client
            .graph
            .execute(session_query(&cypher, session))
            .await?;

        if result.next().await?.is_none() {
            return Err(anyhow::anyhow!(
                "Chat session not found: {}",
                session.session_id
            ));
        }
        Ok(())
    }

    async fn list_sessions(&self, subject: &str) -> Result<Vec<ChatSession>> {
        let q = query(
            "MATCH (s:NotechatSession {auth_subject: $subject})
            RETURN s
            ORDER BY s.last_activity DESC",
        )
        .param("subject", subject);

        let mut result = self.client.graph.execute(q).await?;
        let mut sessions = Vec::new();
        while let Some(row) = result.next().await? {
            sessions.push(session_from_node(&row.get::<Node>("s")?)?);
        }
        Ok(sessions)
    }

    async fn append_message(&self, message: &ChatMessage) -> Result<()> {
        let q = query(
            "CREATE (m:NotechatMessage {
                id: $id,
                session_id: $session_id,
                user_id: $user_id,
                auth_subject: $auth_subject,
                role: $role,
                content: $content,
                provider: $provider,
                model: $model,
                memory_ids: $memory_ids,
                created_at: $created_at
            })",
        )
        .param("id", message.id.to_string())
        .param("session_id", message.session_id.clone())
        .param("user_id", message.user_id.to_string())
        .param("auth_subject", message.auth_subject.clone())
        .param("role", message.role.as_str())
        .param("content", message.content.clone())
        .param("provider", message.provider.as_str())
        .param("model", message.model.clone())
        .param("memory_ids", message.memory_ids.clone())
        .param("created_at", message.created_at.to_rfc3339());

        self.client.graph.run(q).await?;
        Ok(())
    }

    async fn messages(&self, session_id: &str, subject: &str) -> Result<Vec<ChatMessage>> {
        let q = query(
            "MATCH (m:NotechatMessage {session_id: $session_id, auth_subject: $subject})
            RETURN m
            ORDER BY m.created_at ASC",
        )
        .param("session_id", session_id)
        .param("subject", subject);

        let mut result = self.client.graph.execute(q).await?;
        let mut messages = Vec::new();
        while let Some(row) = result.next().await? {
            messages.push(message_from_node(&row.get::<Node>("m")?)?);
        }
        Ok(messages)
    }

    async fn delete_session(&self, session_id: &str, subject: &str) -> Result<bool> {
        let messages = query(
            "MATCH (m:NotechatMessage {session_id: $session_id, auth_subject: $subject})
            DETACH DELETE m",
        )
        .param("session_id", session_id)
        .param("subject", subject);
        self.client.graph.run(messages).await?;

        let session = query(
            "MATCH (s:NotechatSession {session_id: $session_id, auth_subject: $subject})
            WITH s, s.id AS id
            DETACH DELETE s
            RETURN count(id) AS deleted",
        )
        .param("session_id", session_id)
        .param("subject", subject);

        let deleted = deleted_count(&self.client, session).await?;
        if deleted > 0 {
            info!("Deleted chat session: {}", session_id);
        }
        Ok(deleted > 0)
    }
}

// ============================================================================
// Helper functions
// ============================================================================

async fn deleted_count(client: &Neo4jClient, q: neo4rs::Query) -> Result<i64> {
    let mut result = client.graph.execute(q).await?;
    match result.next().await? {
        Some(row) => Ok(row.get::<i64>("deleted")?),
        None => Ok(0),
    }
}

fn key_value(key: Option<&ApiKey>) -> String {
    key.map(|k| k.expose().to_string()).unwrap_or_default()
}

fn ids_value(ids: &[Uuid]) -> Vec<String> {
    ids.iter().map(Uuid::to_string).collect()
}

fn parse_uuid(node: &Node, field: &str) -> Result<Uuid> {
    let raw: String = node.get(field)?;
    Uuid::parse_str(&raw).with_context(|| format!("invalid uuid in {field}"))
}

fn parse_neo4j_datetime(node: &Node, field: &str) -> Result<DateTime<Utc>> {
    let dt_str: String = node.get(field)?;
    let dt = DateTime::parse_from_rfc3339(&dt_str)?;
    Ok(dt.with_timezone(&Utc))
}

fn parse_role(raw: &str) -> Role {
    match raw {
        "assistant" => Role::Assistant,
        _ => Role::User,
    }
}

fn user_from_node(node: &Node) -> Result<User> {
    let key = |field: &str| -> Option<ApiKey> {
        node.get::<String>(field)
            .ok()
            .filter(|k| !k.is_empty())
            .map(ApiKey::new)
    };
    let note_ids = node
        .get::<Vec<String>>("note_ids")
        .unwrap_or_default()
        .iter()
        .filter_map(|id| Uuid::parse_str(id).ok())
        .collect();

    Ok(User {
        id: parse_uuid(node, "id")?,
        auth_subject: node.get("auth_subject")?,
        email: node.get("email").unwrap_or_default(),
        username: node.get("username").unwrap_or_default(),
        first_name: node.get("first_name").unwrap_or_default(),
        last_name: node.get("last_name").unwrap_or_default(),
        openai_key: key("openai_key"),
        gemini_key: key("gemini_key"),
        note_ids,
        created_at: parse_neo4j_datetime(node, "created_at")?,
        updated_at: parse_neo4j_datetime(node, "updated_at")?,
    })
}

fn note_from_node(node: &Node) -> Result<Note> {
    Ok(Note {
        id: parse_uuid(node, "id")?,
        title: node.get("title")?,
        content: node.get("content")?,
        user_id: parse_uuid(node, "user_id")?,
        created_at: parse_neo4j_datetime(node, "created_at")?,
        updated_at: parse_neo4j_datetime(node, "updated_at")?,
    })
}

fn session_from_node(node: &Node) -> Result<ChatSession> {
    let provider: String = node.get("provider")?;
    let message_count: i64 = node.get("message_count").unwrap_or(0);

    Ok(ChatSession {
        id: parse_uuid(node, "id")?,
        session_id: node.get("session_id")?,
        user_id: parse_uuid(node, "user_id")?,
        auth_subject: node.get("auth_subject")?,
        title: node.get("title").unwrap_or_default(),
        provider: provider.parse()?,
        model: node.get("model").unwrap_or_default(),
        message_count: u32::try_from(message_count).unwrap_or(0),
        last_activity: parse_neo4j_datetime(node, "last_activity")?,
        created_at: parse_neo4j_datetime(node, "created_at")?,
        updated_at: parse_neo4j_datetime(node, "updated_at")?,
    })
}

fn message_from_node(node: &Node) -> Result<ChatMessage> {
    let provider: String = node.get("provider")?;
    let role: String = node.get("role")?;

    Ok(ChatMessage {
        id: parse_uuid(node, "id")?,
        session_id: node.get("session_id")?,
        user_id: parse_uuid(node, "user_id")?,
        auth_subject: node.get("auth_subject")?,
        role: parse_role(&role),
        content: node.get("content")?,
        provider: provider.parse()?,
        model: node.get("model").unwrap_or_default(),
        memory_ids: node.get("memory_ids").unwrap_or_default(),
        created_at: parse_neo4j_datetime(node, "created_at")?,
    })
}
