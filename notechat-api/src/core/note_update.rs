//! Rewrites a note from the conversation that happened around it.

use notechat_sdk::{
    ApiKey, CompletionBackend, CompletionRequest, MemoryRecord, MemoryStore, Provider, SdkError,
    build_context,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// How conversation history for a note update is fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteHistoryMode {
    /// Memories recorded under the session id
    SessionFilter,
    /// Semantic search with the session id as the query text
    SemanticSearch,
}

#[derive(Debug, Error)]
pub enum NoteUpdateError {
    #[error("failed to get chat history: {0}")]
    History(#[source] SdkError),

    #[error("AI API call failed: {0}")]
    Provider(#[source] SdkError),
}

#[derive(Debug, Clone)]
pub struct NoteUpdateInput {
    pub auth_subject: String,
    pub session_id: String,
    pub current_content: String,
    pub provider: Provider,
    pub model: String,
    pub api_key: ApiKey,
    /// Prepended to the fixed instructions when non-blank
    pub custom_prompt: Option<String>,
}

const NOTE_UPDATE_INSTRUCTIONS: &str = "You are a focused note-taking assistant that updates notes based on conversation context.

STRICT GUIDELINES:
- ONLY update the note with information directly relevant to the note's topic
- DO NOT add tangential information, personal opinions, or unrelated content
- DO NOT include conversational elements, greetings, or meta-commentary
- DO NOT divert from the note's purpose unless explicitly requested by the user
- Preserve existing note structure and formatting exactly
- Maintain factual accuracy and professional tone

UPDATE RULES:
1. Review current note and conversation history
2. Identify ONLY facts, insights, or updates that directly relate to the note's topic
3. Integrate relevant information while preserving existing content structure
4. Only remove content if it's factually contradicted by new information
5. Use clear formatting (bullet points, headers) for readability
6. Keep content concise and focused on the note's purpose";

const NOTE_UPDATE_TASK: &str = "TASK: Update the note by incorporating ONLY relevant information from the conversation. Return only the updated note content. Do not add any explanations, commentary, or off-topic content.";

pub fn build_note_update_prompt(note: &str, context: &str, custom: Option<&str>) -> String {
    let mut prompt = String::new();
    if let Some(custom) = custom.filter(|c| !c.trim().is_empty()) {
        prompt.push_str(custom);
        prompt.push_str("\n\n");
    }

    prompt.push_str(NOTE_UPDATE_INSTRUCTIONS);
    prompt.push_str("\n\nCURRENT NOTE:\n");
    prompt.push_str(note);
    prompt.push_str("\n\nCONVERSATION CONTEXT:\n");
    prompt.push_str(context);
    prompt.push_str("\n\n");
    prompt.push_str(NOTE_UPDATE_TASK);
    prompt
}

pub struct NoteUpdateOrchestrator {
    completions: Arc<dyn CompletionBackend>,
    memory: Arc<dyn MemoryStore>,
    mode: NoteHistoryMode,
    limit: usize,
}

impl NoteUpdateOrchestrator {
    pub fn new(
        completions: Arc<dyn CompletionBackend>,
        memory: Arc<dyn MemoryStore>,
        mode: NoteHistoryMode,
        limit: usize,
    ) -> Self {
        Self {
            completions,
            memory,
            mode,
            limit,
        }
    }

    /// Produce the updated note content; nothing is persisted here
    pub async fn update_note(&self, input: NoteUpdateInput) -> Result<String, NoteUpdateError> {
        let history = self
            .history(&input.auth_subject, &input.session_id)
            .await
            .map_err(NoteUpdateError::History)?;
        debug!(
            session_id = %input.session_id,
            "Updating note from {} memories",
            history.len()
        );

        let prompt = build_note_update_prompt(
            &input.current_content,
            &build_context(&history),
            input.custom_prompt.as_deref(),
        );

        let request = CompletionRequest {
            provider: input.provider,
            model: input.model,
            prompt,
            context: String::new(),
            api_key: input.api_key,
        };

        let content = self
            .completions
            .complete(&request)
            .await
            .map_err(NoteUpdateError::Provider)?;

        info!(session_id = %input.session_id, "Generated note update");
        Ok(content)
    }

    async fn history(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> notechat_sdk::Result<Vec<MemoryRecord>> {
        match self.mode {
            NoteHistoryMode::SessionFilter => {
                self.memory
                    .session_history(user_id, session_id, self.limit)
                    .await
            },
            NoteHistoryMode::SemanticSearch => {
                self.memory.search(user_id, session_id, self.limit).await
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::mock;
    use axum::{Json, Router, routing::post};
    use notechat_sdk::mock::{InMemoryMemoryStore, MockCompletionBackend};
    use notechat_sdk::{MemoryClient, MemoryConfig};
    use serde_json::json;

    mock! {
        Completions {}

        #[async_trait]
        impl CompletionBackend for Completions {
            async fn complete(&self, request: &CompletionRequest) -> notechat_sdk::Result<String>;
        }
    }

    fn input(custom: Option<&str>) -> NoteUpdateInput {
        NoteUpdateInput {
            auth_subject: "user_abc".into(),
            session_id: "s-1".into(),
            current_content: "# Trip\n- Flights booked".into(),
            provider: Provider::OpenAi,
            model: "gpt-4o-mini".into(),
            api_key: ApiKey::new("sk-test"),
            custom_prompt: custom.map(str::to_string),
        }
    }

    fn seeded_memory() -> Arc<InMemoryMemoryStore> {
        let memory = Arc::new(InMemoryMemoryStore::new());
        memory.insert(
            MemoryRecord::new("m-1", "Hotel is in Lisbon")
                .with_user("user_abc")
                .with_run("s-1"),
        );
        memory.insert(
            MemoryRecord::new("m-2", "Unrelated session")
                .with_user("user_abc")
                .with_run("s-2"),
        );
        memory
    }

    #[test]
    fn test_prompt_layout() {
        let prompt = build_note_update_prompt("the note", "a\nb", None);

        assert!(prompt.starts_with("You are a focused note-taking assistant"));
        assert!(prompt.contains("CURRENT NOTE:\nthe note\n\nCONVERSATION CONTEXT:\na\nb\n\nTASK:"));
        assert!(prompt.ends_with("off-topic content."));
    }

    #[test]
    fn test_custom_prompt_prepended() {
        let prompt = build_note_update_prompt("n", "c", Some("Keep it short."));
        assert!(prompt.starts_with("Keep it short.\n\nYou are a focused"));

        let blank = build_note_update_prompt("n", "c", Some("   "));
        assert!(blank.starts_with("You are a focused"));
    }

    #[tokio::test]
    async fn test_session_history_feeds_prompt() {
        let completions = Arc::new(MockCompletionBackend::new("# Trip\n- Flights booked\n- Hotel in Lisbon"));
        let orchestrator = NoteUpdateOrchestrator::new(
            completions.clone(),
            seeded_memory(),
            NoteHistoryMode::SessionFilter,
            10,
        );

        let content = orchestrator.update_note(input(None)).await.unwrap();
        assert_eq!(content, "# Trip\n- Flights booked\n- Hotel in Lisbon");

        let request = &completions.requests()[0];
        assert_eq!(request.context, "");
        assert!(request.prompt.contains("CONVERSATION CONTEXT:\nHotel is in Lisbon\n\n"));
        assert!(!request.prompt.contains("Unrelated session"));
        assert!(request.prompt.contains("CURRENT NOTE:\n# Trip\n- Flights booked"));
    }

    #[tokio::test]
    async fn test_history_failure_skips_provider() {
        let memory = seeded_memory();
        memory.set_fail_history(true);

        let mut completions = MockCompletions::new();
        completions.expect_complete().never();

        let orchestrator = NoteUpdateOrchestrator::new(
            Arc::new(completions),
            memory,
            NoteHistoryMode::SessionFilter,
            10,
        );

        let err = orchestrator.update_note(input(None)).await.unwrap_err();
        assert!(matches!(err, NoteUpdateError::History(_)));
        assert!(err.to_string().starts_with("failed to get chat history"));
    }

    #[tokio::test]
    async fn test_semantic_mode_searches_with_session_id() {
        let memory = Arc::new(InMemoryMemoryStore::new());
        memory.set_fail_history(true);

        let mut completions = MockCompletions::new();
        completions
            .expect_complete()
            .times(1)
            .returning(|_| Ok("updated".to_string()));

        let orchestrator = NoteUpdateOrchestrator::new(
            Arc::new(completions),
            memory,
            NoteHistoryMode::SemanticSearch,
            10,
        );

        assert_eq!(orchestrator.update_note(input(None)).await.unwrap(), "updated");
    }

    #[tokio::test]
    async fn test_provider_failure() {
        let completions = Arc::new(MockCompletionBackend::new("unused"));
        completions.set_failing(true);
        let orchestrator = NoteUpdateOrchestrator::new(
            completions,
            seeded_memory(),
            NoteHistoryMode::SessionFilter,
            10,
        );

        let err = orchestrator.update_note(input(Some("Be brief"))).await.unwrap_err();
        assert!(matches!(err, NoteUpdateError::Provider(_)));
    }

    /// Memory service stand-in that answers history lookups with an object
    async fn wrapped_history_service() -> Arc<MemoryClient> {
        let router = Router::new().route(
            "/v2/memories/",
            post(|| async {
                Json(json!({
                    "error": "rate limited",
                    "results": [{ "id": "a", "memory": "Hotel is in Lisbon" }],
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

        let mut config = MemoryConfig::new(ApiKey::new("m0-key"));
        config.base_url = format!("http://{addr}");
        Arc::new(MemoryClient::new(config).unwrap())
    }

    #[tokio::test]
    async fn test_malformed_history_aborts_update() {
        let mut completions = MockCompletions::new();
        completions.expect_complete().never();

        let orchestrator = NoteUpdateOrchestrator::new(
            Arc::new(completions),
            wrapped_history_service().await,
            NoteHistoryMode::SessionFilter,
            10,
        );

        let err = orchestrator.update_note(input(None)).await.unwrap_err();
        assert!(matches!(err, NoteUpdateError::History(SdkError::Decode(_))));
    }
}
