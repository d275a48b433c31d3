use anyhow::{Context, Result};
use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};
use notechat_sdk::{CompletionBackend, MemoryClient, MemoryStore, ProviderClient};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::api;
use crate::core::{
    auth::{AuthManager, require_auth},
    config::Settings,
    conversation::ConversationOrchestrator,
    memory_writer::MemoryWriter,
    note_update::NoteUpdateOrchestrator,
    storage::{ChatStore, NoteStore, Stores, UserStore},
};
use crate::middleware::{error_handler, request_id};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub users: Arc<dyn UserStore>,
    pub notes: Arc<dyn NoteStore>,
    pub chats: Arc<dyn ChatStore>,
    pub conversation: Arc<ConversationOrchestrator>,
    pub note_updates: Arc<NoteUpdateOrchestrator>,
    pub auth: Arc<AuthManager>,
}

impl AppState {
    /// Real provider and memory clients plus the configured storage backend
    pub async fn from_settings(settings: Settings) -> Result<Self> {
        let completions = Arc::new(
            ProviderClient::new(settings.providers.client_config())
                .context("failed to build provider client")?,
        );
        let memory = Arc::new(
            MemoryClient::new(settings.memory.client_config())
                .context("memory.api_key must be set")?,
        );
        let stores = Stores::from_config(&settings.storage).await?;

        info!("Using {:?} storage backend", settings.storage.backend);
        Self::with_collaborators(settings, stores, completions, memory)
    }

    /// Wire the orchestrators around the given collaborators. Must be called
    /// inside a Tokio runtime, which runs the memory writer.
    pub fn with_collaborators(
        settings: Settings,
        stores: Stores,
        completions: Arc<dyn CompletionBackend>,
        memory: Arc<dyn MemoryStore>,
    ) -> Result<Self> {
        let auth = AuthManager::new(&settings.auth).context("invalid auth configuration")?;
        let writer = MemoryWriter::spawn(memory.clone(), settings.memory.writer_queue);

        let conversation = ConversationOrchestrator::new(
            completions.clone(),
            memory.clone(),
            stores.chats.clone(),
            writer,
            settings.memory.chat_top_k,
        );
        let note_updates = NoteUpdateOrchestrator::new(
            completions,
            memory,
            settings.memory.note_history,
            settings.memory.note_history_limit,
        );

        Ok(Self {
            settings: Arc::new(settings),
            users: stores.users,
            notes: stores.notes,
            chats: stores.chats,
            conversation: Arc::new(conversation),
            note_updates: Arc::new(note_updates),
            auth: Arc::new(auth),
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/public/health", get(api::health::health_check))
        .route("/models", get(api::models::list_models));

    let protected_routes = Router::new()
        .route(
            "/user/profile",
            post(api::users::upsert_profile).get(api::users::get_profile),
        )
        .route("/user/api-keys", put(api::users::update_api_keys))
        .route("/user/api-keys/:key_type", delete(api::users::delete_api_key))
        .route("/user/with-notes", get(api::users::get_with_notes))
        .route(
            "/notes",
            post(api::notes::create_note).get(api::notes::list_notes),
        )
        .route(
            "/notes/:id",
            get(api::notes::get_note)
                .put(api::notes::update_note)
                .delete(api::notes::delete_note),
        )
        .route("/notes/:id/chat", post(api::chat::note_chat))
        .route(
            "/notes/:id/apply-suggestion",
            post(api::notes::apply_suggestion),
        )
        .route("/chat", post(api::chat::chat))
        .route("/chat/sessions", get(api::chat::list_sessions))
        .route(
            "/chat/sessions/:session_id",
            get(api::chat::session_history).delete(api::chat::delete_session),
        )
        .route("/chat/update-note", post(api::chat::update_note_with_chat))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            require_auth,
        ));

    Router::new()
        .nest("/api/v1", public_routes.merge(protected_routes))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(CatchPanicLayer::custom(error_handler::handle_panic))
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_id::add_request_id))
                .layer(middleware::from_fn(error_handler::handle_errors)),
        )
}
