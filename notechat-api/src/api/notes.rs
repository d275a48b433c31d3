use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::{ensure_user, require_user};
use crate::app::AppState;
use crate::core::auth::AuthenticatedUser;
use crate::models::{
    error::{ApiError, ApiResult},
    note::{ApplySuggestionRequest, CreateNoteRequest, Note, NotePatch, UpdateNoteBody, parse_note_id},
};

const NOTE_NOT_FOUND: &str = "Note not found";

/// Owner id of the caller, if a profile exists
async fn owner_id(state: &AppState, subject: &str) -> ApiResult<Option<Uuid>> {
    Ok(state
        .users
        .find_by_subject(subject)
        .await?
        .map(|user| user.id))
}

pub async fn create_note(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    body: Result<Json<CreateNoteRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = body?;
    if request.title.trim().is_empty() || request.content.trim().is_empty() {
        return Err(ApiError::BadRequest("Title and content are required".into()));
    }

    let user = require_user(&state, &caller.subject).await?;
    let note = Note::new(user.id, request.title, request.content);
    state.notes.insert(&note).await?;

    if let Err(e) = state.users.add_note_ref(user.id, note.id).await {
        warn!("Failed to link note {} to user {}: {:#}", note.id, user.id, e);
    }

    info!("Created note {} for {}", note.id, caller.subject);
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Note created successfully",
            "noteId": note.id,
            "note": note,
        })),
    ))
}

pub async fn list_notes(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> ApiResult<impl IntoResponse> {
    let user = ensure_user(&state, &caller.subject).await?;
    let notes = state.notes.list_for_user(&user).await?;

    Ok(Json(json!({
        "message": "Notes retrieved successfully",
        "count": notes.len(),
        "notes": notes,
    })))
}

pub async fn get_note(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let note_id = parse_note_id(&id)?;
    let Some(user_id) = owner_id(&state, &caller.subject).await? else {
        return Err(ApiError::NotFound(NOTE_NOT_FOUND.into()));
    };

    let note = state
        .notes
        .find(note_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(NOTE_NOT_FOUND.into()))?;

    Ok(Json(json!({ "message": "Note retrieved", "note": note })))
}

/// Partial update; empty fields are left unchanged
pub async fn update_note(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    body: Result<Json<UpdateNoteBody>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let note_id = parse_note_id(&id)?;
    let Json(request) = body?;
    let Some(user_id) = owner_id(&state, &caller.subject).await? else {
        return Err(ApiError::NotFound(NOTE_NOT_FOUND.into()));
    };

    let note = state
        .notes
        .update(note_id, user_id, NotePatch::new(request.title, request.content))
        .await?
        .ok_or_else(|| ApiError::NotFound(NOTE_NOT_FOUND.into()))?;

    Ok(Json(json!({ "message": "Note updated successfully", "note": note })))
}

pub async fn delete_note(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let note_id = parse_note_id(&id)?;
    let Some(user_id) = owner_id(&state, &caller.subject).await? else {
        return Err(ApiError::NotFound(NOTE_NOT_FOUND.into()));
    };

    if !state.notes.delete(note_id, user_id).await? {
        return Err(ApiError::NotFound(NOTE_NOT_FOUND.into()));
    }

    if let Err(e) = state.users.remove_note_ref(user_id, note_id).await {
        warn!("Failed to unlink note {} from user {}: {:#}", note_id, user_id, e);
    }

    info!("Deleted note {}", note_id);
    Ok(Json(json!({ "message": "Note deleted successfully" })))
}

/// Overwrite title and/or content with an accepted AI suggestion
pub async fn apply_suggestion(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    body: Result<Json<ApplySuggestionRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = body?;
    let patch = NotePatch::new(request.new_title, request.new_content);
    if patch.is_empty() {
        return Err(ApiError::BadRequest(
            "At least one field (newTitle or newContent) must be provided".into(),
        ));
    }

    let user = state
        .users
        .find_by_subject(&caller.subject)
        .await?
        .ok_or_else(|| ApiError::NotFound("User profile not found".into()))?;
    let note_id = parse_note_id(&id)?;

    let note = state
        .notes
        .update(note_id, user.id, patch)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound("Note not found or you don't have permission to update it".into())
        })?;

    Ok(Json(note))
}
