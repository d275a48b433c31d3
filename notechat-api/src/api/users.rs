use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use notechat_sdk::Provider;
use serde_json::json;
use tracing::info;

use super::{ensure_user, require_user};
use crate::app::AppState;
use crate::core::auth::AuthenticatedUser;
use crate::models::{
    error::{ApiError, ApiResult},
    user::{ApiKeysUpdate, ProfileRequest, User, UserWithNotes},
};

/// Create the caller's profile, or sync it when it already exists
pub async fn upsert_profile(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    body: Result<Json<ProfileRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = body?;

    let (status, message, user) = match state.users.find_by_subject(&caller.subject).await? {
        Some(mut user) => {
            user.apply_profile(request);
            state.users.replace(&user).await?;
            (StatusCode::OK, "User profile updated", user)
        },
        None => {
            let mut user = User::new(&caller.subject);
            user.apply_profile(request);
            state.users.insert(&user).await?;
            info!("Created profile for {}", caller.subject);
            (StatusCode::CREATED, "User profile created", user)
        },
    };

    Ok((
        status,
        Json(json!({ "message": message, "user": user.profile() })),
    ))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> ApiResult<impl IntoResponse> {
    let user = ensure_user(&state, &caller.subject).await?;

    Ok(Json(json!({
        "message": "User profile retrieved successfully",
        "user": user.profile(),
    })))
}

pub async fn get_with_notes(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> ApiResult<impl IntoResponse> {
    let user = ensure_user(&state, &caller.subject).await?;
    let notes = state.notes.list_for_user(&user).await?;

    Ok(Json(json!({
        "message": "User with notes retrieved successfully",
        "user": UserWithNotes {
            profile: user.profile(),
            notes,
        },
    })))
}

/// Store the non-empty keys of the request; absent or blank keys are left alone
pub async fn update_api_keys(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    body: Result<Json<ApiKeysUpdate>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(update) = body?;

    let user = state
        .users
        .find_by_subject(&caller.subject)
        .await?
        .ok_or_else(|| ApiError::NotFound("User profile not found".into()))?;

    for (provider, key) in update.provided() {
        state
            .users
            .set_api_key(&user.auth_subject, provider, Some(key))
            .await?;
    }

    let user = require_user(&state, &caller.subject).await?;
    Ok(Json(json!({
        "message": "API keys updated successfully",
        "apiKeyStatus": user.key_status(),
    })))
}

pub async fn delete_api_key(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(key_type): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let provider: Provider = key_type.parse().map_err(|_| {
        ApiError::BadRequest("Invalid key type. Must be 'openai' or 'gemini'".into())
    })?;

    if !state
        .users
        .set_api_key(&caller.subject, provider, None)
        .await?
    {
        return Err(ApiError::NotFound("User profile not found".into()));
    }

    info!("Deleted {} key for {}", provider, caller.subject);
    Ok(Json(json!({
        "message": format!("{key_type} API key deleted successfully"),
    })))
}
