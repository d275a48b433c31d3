use chrono::Utc;
use notechat_sdk::{
    ApiKey, CompletionBackend, CompletionRequest, MemoryRecord, MemoryStore, Provider, Role,
    SdkError, build_context,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::memory_writer::{MemoryWrite, MemoryWriter};
use crate::core::storage::ChatStore;
use crate::models::chat::{ChatMessage, ChatReply, ChatSession};

#[derive(Debug, Error)]
pub enum TurnError {
    /// Unknown to the caller; also used for sessions owned by someone else
    #[error("chat session {0} not found")]
    SessionNotFound(String),

    #[error("AI API call failed: {0}")]
    Provider(#[source] SdkError),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// One user message to answer inside a persisted session
#[derive(Debug, Clone)]
pub struct TurnInput {
    pub user_id: Uuid,
    pub auth_subject: String,
    /// Blank or absent starts a new session
    pub session_id: Option<String>,
    pub message: String,
    pub provider: Provider,
    pub model: String,
    pub api_key: ApiKey,
}

/// A session-less exchange: retrieval runs on `message`, the provider sees
/// `prompt`, and `message` plus the reply are written to memory.
#[derive(Debug, Clone)]
pub struct ExchangeInput {
    pub auth_subject: String,
    pub session_id: String,
    pub message: String,
    pub prompt: String,
    pub provider: Provider,
    pub model: String,
    pub api_key: ApiKey,
}

#[derive(Debug, Clone)]
pub struct Exchange {
    pub reply: String,
    pub memories: Vec<MemoryRecord>,
}

/// Retrieval-augmented chat over a provider, with memory writes detached
/// from the request.
pub struct ConversationOrchestrator {
    completions: Arc<dyn CompletionBackend>,
    memory: Arc<dyn MemoryStore>,
    chats: Arc<dyn ChatStore>,
    writer: MemoryWriter,
    top_k: usize,
}

impl ConversationOrchestrator {
    pub fn new(
        completions: Arc<dyn CompletionBackend>,
        memory: Arc<dyn MemoryStore>,
        chats: Arc<dyn ChatStore>,
        writer: MemoryWriter,
        top_k: usize,
    ) -> Self {
        Self {
            completions,
            memory,
            chats,
            writer,
            top_k,
        }
    }

    pub async fn chat_turn(&self, input: TurnInput) -> Result<ChatReply, TurnError> {
        let session_id = input
            .session_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let session = self.upsert_session(&session_id, &input).await?;
        self.chats
            .append_message(&ChatMessage::new(
                &session,
                Role::User,
                input.message.clone(),
                Vec::new(),
            ))
            .await?;

        let memories = self.retrieve(&input.auth_subject, &input.message).await;
        let reply = self
            .complete(
                input.provider,
                &input.model,
                input.message.clone(),
                build_context(&memories),
                input.api_key,
            )
            .await?;

        let memory_ids = memories.iter().map(|m| m.id.clone()).collect();
        let assistant = ChatMessage::new(&session, Role::Assistant, reply.clone(), memory_ids);
        self.chats.append_message(&assistant).await?;

        self.record(&input.auth_subject, &session_id, input.message, &reply);

        info!(
            session_id = %session_id,
            provider = %input.provider,
            "Chat turn completed with {} memories",
            memories.len()
        );

        Ok(ChatReply {
            session_id,
            message: reply,
            role: Role::Assistant,
            model: input.provider,
            model_id: input.model,
            memories,
            created_at: assistant.created_at,
        })
    }

    pub async fn exchange(&self, input: ExchangeInput) -> Result<Exchange, TurnError> {
        let memories = self.retrieve(&input.auth_subject, &input.message).await;
        let reply = self
            .complete(
                input.provider,
                &input.model,
                input.prompt,
                build_context(&memories),
                input.api_key,
            )
            .await?;

        self.record(&input.auth_subject, &input.session_id, input.message, &reply);

        Ok(Exchange { reply, memories })
    }

    async fn upsert_session(
        &self,
        session_id: &str,
        input: &TurnInput,
    ) -> Result<ChatSession, TurnError> {
        match self.chats.find_session(session_id).await? {
            Some(existing) if existing.auth_subject != input.auth_subject => {
                warn!(session_id, "Chat session belongs to another user");
                Err(TurnError::SessionNotFound(session_id.to_string()))
            },
            Some(mut existing) => {
                existing.touch();
                existing.provider = input.provider;
                existing.model = input.model.clone();
                self.chats.replace_session(&existing).await?;
                Ok(existing)
            },
            None => {
                let session = ChatSession::start(
                    session_id,
                    input.user_id,
                    input.auth_subject.clone(),
                    input.provider,
                    input.model.clone(),
                    &input.message,
                );
                self.chats.insert_session(&session).await?;
                Ok(session)
            },
        }
    }

    /// Memory search; failures degrade to no context
    async fn retrieve(&self, user_id: &str, query: &str) -> Vec<MemoryRecord> {
        match self.memory.search(user_id, query, self.top_k).await {
            Ok(memories) => {
                debug!("Retrieved {} memories", memories.len());
                memories
            },
            Err(e) => {
                warn!("Failed to search memories: {}", e);
                Vec::new()
            },
        }
    }

    async fn complete(
        &self,
        provider: Provider,
        model: &str,
        prompt: String,
        context: String,
        api_key: ApiKey,
    ) -> Result<String, TurnError> {
        let started = Utc::now();
        let request = CompletionRequest {
            provider,
            model: model.to_string(),
            prompt,
            context,
            api_key,
        };

        let reply = self
            .completions
            .complete(&request)
            .await
            .map_err(TurnError::Provider)?;

        debug!(
            provider = %provider,
            model,
            "Completion took {}ms",
            (Utc::now() - started).num_milliseconds()
        );
        Ok(reply)
    }

    fn record(&self, user_id: &str, session_id: &str, message: String, reply: &str) {
        self.writer.enqueue(MemoryWrite {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            content: message,
            role: Role::User,
        });
        self.writer.enqueue(MemoryWrite {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            content: reply.to_string(),
            role: Role::Assistant,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::InMemoryChatStore;
    use async_trait::async_trait;
    use mockall::mock;
    use notechat_sdk::mock::{InMemoryMemoryStore, MockCompletionBackend};

    mock! {
        Completions {}

        #[async_trait]
        impl CompletionBackend for Completions {
            async fn complete(&self, request: &CompletionRequest) -> notechat_sdk::Result<String>;
        }
    }

    struct Harness {
        orchestrator: ConversationOrchestrator,
        completions: Arc<MockCompletionBackend>,
        memory: Arc<InMemoryMemoryStore>,
        chats: Arc<InMemoryChatStore>,
    }

    fn harness() -> Harness {
        let completions = Arc::new(MockCompletionBackend::new("Sure."));
        let memory = Arc::new(InMemoryMemoryStore::new());
        let chats = Arc::new(InMemoryChatStore::new());
        let writer = MemoryWriter::spawn(memory.clone(), 16);

        Harness {
            orchestrator: ConversationOrchestrator::new(
                completions.clone(),
                memory.clone(),
                chats.clone(),
                writer,
                5,
            ),
            completions,
            memory,
            chats,
        }
    }

    fn input(session_id: Option<&str>, message: &str) -> TurnInput {
        TurnInput {
            user_id: Uuid::nil(),
            auth_subject: "user_abc".into(),
            session_id: session_id.map(str::to_string),
            message: message.into(),
            provider: Provider::OpenAi,
            model: "gpt-4o-mini".into(),
            api_key: ApiKey::new("sk-test"),
        }
    }

    #[tokio::test]
    async fn test_new_session_generated_when_blank() {
        let h = harness();
        let reply = h.orchestrator.chat_turn(input(Some("  "), "Hello")).await.unwrap();

        assert!(Uuid::parse_str(&reply.session_id).is_ok());
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.message, "Sure.");
        assert_eq!(reply.model, Provider::OpenAi);
        assert_eq!(reply.model_id, "gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_two_turns_accumulate() {
        let h = harness();
        h.orchestrator
            .chat_turn(input(Some("s-1"), "First question"))
            .await
            .unwrap();
        h.orchestrator
            .chat_turn(input(Some("s-1"), "Second question"))
            .await
            .unwrap();

        let session = h.chats.find_session("s-1").await.unwrap().unwrap();
        assert_eq!(session.message_count, 2);
        assert_eq!(session.title, "First question");

        let messages = h.chats.messages("s-1", "user_abc").await.unwrap();
        let roles: Vec<_> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
        );

        assert!(h.memory.wait_for_adds(4).await);
        let adds = h.memory.adds();
        assert_eq!(adds[0].role, Role::User);
        assert_eq!(adds[1].role, Role::Assistant);
        assert!(adds.iter().all(|a| a.user_id == "user_abc" && a.session_id == "s-1"));
    }

    #[tokio::test]
    async fn test_memories_become_context() {
        let h = harness();
        h.memory.insert(
            MemoryRecord::new("m-1", "Rex is a golden retriever").with_user("user_abc"),
        );
        h.memory
            .insert(MemoryRecord::new("m-2", "Owns a retriever").with_user("user_xyz"));

        let reply = h
            .orchestrator
            .chat_turn(input(None, "What breed is Rex?"))
            .await
            .unwrap();

        assert_eq!(reply.memories.len(), 1);
        let request = &h.completions.requests()[0];
        assert_eq!(request.context, "Rex is a golden retriever");
        assert_eq!(request.prompt, "What breed is Rex?");

        let messages = h.chats.messages(&reply.session_id, "user_abc").await.unwrap();
        assert_eq!(messages[1].memory_ids, vec!["m-1".to_string()]);
    }

    #[tokio::test]
    async fn test_search_failure_still_answers() {
        let h = harness();
        h.memory.set_fail_search(true);

        let reply = h.orchestrator.chat_turn(input(None, "Hello")).await.unwrap();

        assert!(reply.memories.is_empty());
        assert_eq!(h.completions.requests()[0].context, "");
    }

    #[tokio::test]
    async fn test_provider_failure_keeps_user_message() {
        let h = harness();
        h.completions.set_failing(true);

        let err = h
            .orchestrator
            .chat_turn(input(Some("s-1"), "Hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::Provider(_)));

        let messages = h.chats.messages("s-1", "user_abc").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
        assert!(h.memory.adds().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_session_rejected_before_provider() {
        let memory = Arc::new(InMemoryMemoryStore::new());
        let chats = Arc::new(InMemoryChatStore::new());
        chats
            .insert_session(&ChatSession::start(
                "s-other",
                Uuid::new_v4(),
                "user_xyz",
                Provider::Gemini,
                "gemini-1.5-flash",
                "Theirs",
            ))
            .await
            .unwrap();

        let mut completions = MockCompletions::new();
        completions.expect_complete().never();

        let orchestrator = ConversationOrchestrator::new(
            Arc::new(completions),
            memory.clone(),
            chats.clone(),
            MemoryWriter::spawn(memory, 4),
            5,
        );

        let err = orchestrator
            .chat_turn(input(Some("s-other"), "Mine now"))
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::SessionNotFound(id) if id == "s-other"));
        assert!(chats.messages("s-other", "user_abc").await.unwrap().is_empty());
        assert_eq!(chats.messages("s-other", "user_xyz").await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_exchange_searches_message_but_sends_prompt() {
        let h = harness();
        h.memory
            .insert(MemoryRecord::new("m-1", "Likes bullet points").with_user("user_abc"));

        let exchange = h
            .orchestrator
            .exchange(ExchangeInput {
                auth_subject: "user_abc".into(),
                session_id: "note-123".into(),
                message: "Use bullet points".into(),
                prompt: "Rewrite the note".into(),
                provider: Provider::Gemini,
                model: "gemini-1.5-flash".into(),
                api_key: ApiKey::new("g-key"),
            })
            .await
            .unwrap();

        assert_eq!(exchange.reply, "Sure.");
        assert_eq!(exchange.memories.len(), 1);

        let request = &h.completions.requests()[0];
        assert_eq!(request.prompt, "Rewrite the note");
        assert_eq!(request.context, "Likes bullet points");

        assert!(h.memory.wait_for_adds(2).await);
        let adds = h.memory.adds();
        assert_eq!(adds[0].content, "Use bullet points");
        assert_eq!(adds[0].session_id, "note-123");
        assert!(h.chats.list_sessions("user_abc").await.unwrap().is_empty());
    }
}
