//! Chat endpoints: session turns, history, note chat and AI note updates.
//!
//! Every AI endpoint validates in the same order: body shape, provider tag,
//! profile, provider key, then the note. Nothing touches storage or the
//! network before the provider tag is known to be supported.

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    response::IntoResponse,
};
use serde_json::json;
use tracing::info;

use super::{require_key, require_user};
use crate::app::AppState;
use crate::core::auth::AuthenticatedUser;
use crate::core::conversation::{ExchangeInput, TurnInput};
use crate::core::note_update::NoteUpdateInput;
use crate::models::{
    chat::{ChatRequest, ChatResponse, SessionHistory, SessionList, UpdateNoteWithChatRequest},
    error::{ApiError, ApiResult},
    note::{Note, NoteChatRequest, NoteChatResponse, NotePatch, parse_note_id},
};

/// Prompt for a question asked about one note
pub fn note_context_prompt(note: &Note, message: &str) -> String {
    format!(
        "You are an AI assistant helping with note-taking. Here's the current note:\n\n\
         Title: {}\n\
         Content: {}\n\n\
         User's request: {}\n\n\
         Please provide a helpful response. If the user is asking for improvements, suggestions, \
         or modifications to the note content, provide your response in a way that could be \
         directly applied to enhance the note. Focus on being concise and actionable. If you're \
         suggesting content changes, provide the improved version that can be used to update the note.",
        note.title, note.content, message
    )
}

fn require_message(message: &str) -> ApiResult<()> {
    if message.trim().is_empty() {
        return Err(ApiError::BadRequest("Message is required".into()));
    }
    Ok(())
}

pub async fn chat(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<Json<ChatResponse>> {
    let Json(request) = body?;
    require_message(&request.message)?;
    let provider = ApiError::provider(&request.model)?;

    let user = require_user(&state, &caller.subject).await?;
    let api_key = require_key(&user, provider)?;
    let model = state
        .settings
        .providers
        .resolve_model(provider, request.model_id.as_deref());

    let reply = state
        .conversation
        .chat_turn(TurnInput {
            user_id: user.id,
            auth_subject: caller.subject,
            session_id: request.session_id,
            message: request.message,
            provider,
            model,
            api_key,
        })
        .await?;

    Ok(Json(ChatResponse {
        message: "Chat response generated successfully".to_string(),
        data: reply,
    }))
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> ApiResult<Json<SessionList>> {
    let sessions = state.chats.list_sessions(&caller.subject).await?;

    Ok(Json(SessionList {
        message: "Chat sessions retrieved successfully".to_string(),
        count: sessions.len(),
        sessions,
    }))
}

pub async fn session_history(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionHistory>> {
    let messages = state.chats.messages(&session_id, &caller.subject).await?;

    Ok(Json(SessionHistory {
        message: "Chat history retrieved successfully".to_string(),
        session_id,
        count: messages.len(),
        messages,
    }))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(session_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    if !state
        .chats
        .delete_session(&session_id, &caller.subject)
        .await?
    {
        return Err(ApiError::NotFound("Chat session not found".into()));
    }

    Ok(Json(json!({ "message": "Chat session deleted successfully" })))
}

/// Ask about one note; the reply doubles as a suggestion the client may apply
pub async fn note_chat(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    body: Result<Json<NoteChatRequest>, JsonRejection>,
) -> ApiResult<Json<NoteChatResponse>> {
    let Json(request) = body?;
    require_message(&request.message)?;
    let provider = ApiError::provider(&request.provider)?;

    let user = require_user(&state, &caller.subject).await?;
    let api_key = require_key(&user, provider)?;

    let note_id = parse_note_id(&id)?;
    let note = state
        .notes
        .find(note_id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Note not found".into()))?;

    let model = state
        .settings
        .providers
        .resolve_model(provider, request.model.as_deref());
    let exchange = state
        .conversation
        .exchange(ExchangeInput {
            auth_subject: caller.subject,
            session_id: format!("note-{}", note.id),
            prompt: note_context_prompt(&note, &request.message),
            message: request.message,
            provider,
            model: model.clone(),
            api_key,
        })
        .await?;

    Ok(Json(NoteChatResponse {
        message: exchange.reply.clone(),
        model: provider.to_string(),
        model_id: model,
        note_context: note.context_line(),
        suggestion: exchange.reply,
    }))
}

/// Rewrite a note from a chat session's history and save the result
pub async fn update_note_with_chat(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    body: Result<Json<UpdateNoteWithChatRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = body?;
    let provider = ApiError::provider(&request.model)?;

    let user = require_user(&state, &caller.subject).await?;
    let api_key = require_key(&user, provider)?;

    let note_id = parse_note_id(&request.note_id)?;
    let note = state
        .notes
        .find(note_id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Note not found".into()))?;

    let content = state
        .note_updates
        .update_note(NoteUpdateInput {
            auth_subject: caller.subject,
            session_id: request.session_id,
            current_content: note.content,
            provider,
            model: state
                .settings
                .providers
                .resolve_model(provider, request.model_id.as_deref()),
            api_key,
            custom_prompt: request.prompt,
        })
        .await?;

    let note = state
        .notes
        .update(note_id, user.id, NotePatch::content(content))
        .await?
        .ok_or_else(|| ApiError::NotFound("Note not found".into()))?;

    info!("Updated note {} from chat", note.id);
    Ok(Json(json!({
        "message": "Note updated successfully with AI assistance",
        "note": {
            "id": note.id,
            "title": note.title,
            "content": note.content,
            "updatedAt": note.updated_at,
        },
    })))
}
