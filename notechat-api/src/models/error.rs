use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use notechat_sdk::{Provider, SdkError};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::core::conversation::TurnError;
use crate::core::note_update::NoteUpdateError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Model must be 'openai' or 'gemini' (got '{0}')")]
    UnsupportedProvider(String),

    #[error("No {0} API key found. Please add your API key in profile settings.")]
    MissingApiKey(Provider),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("AI service failed")]
    AiService,

    #[error("Memory service failed")]
    MemoryService,

    #[error("Database operation failed")]
    Database,

    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    pub param: Option<String>,
    pub code: Option<String>,
}

impl ApiError {
    /// Parse a provider tag, rejecting anything but the supported ones
    pub fn provider(tag: &str) -> ApiResult<Provider> {
        tag.parse()
            .map_err(|_| ApiError::UnsupportedProvider(tag.to_string()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, code, param) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", None, None),
            ApiError::UnsupportedProvider(_) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                Some("unsupported_provider"),
                Some("model"),
            ),
            ApiError::MissingApiKey(_) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                Some("missing_api_key"),
                None,
            ),
            ApiError::Unauthorized(_) => {
                (StatusCode::UNAUTHORIZED, "authentication_error", None, None)
            },
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found_error", None, None),
            ApiError::AiService => (StatusCode::BAD_GATEWAY, "ai_service_error", None, None),
            ApiError::MemoryService => {
                (StatusCode::BAD_GATEWAY, "memory_service_error", None, None)
            },
            ApiError::Database => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "database_error",
                None,
                None,
            ),
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                None,
                None,
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                message: self.to_string(),
                r#type: error_type.to_string(),
                param: param.map(String::from),
                code: code.map(String::from),
            },
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        error!("Storage error: {:#}", err);
        ApiError::Database
    }
}

impl From<TurnError> for ApiError {
    fn from(err: TurnError) -> Self {
        match err {
            TurnError::SessionNotFound(_) => ApiError::NotFound("Chat session not found".into()),
            TurnError::Provider(e) => ai_service_failure(e),
            TurnError::Storage(e) => e.into(),
        }
    }
}

impl From<NoteUpdateError> for ApiError {
    fn from(err: NoteUpdateError) -> Self {
        match err {
            NoteUpdateError::History(e) => {
                error!("Failed to get chat history: {}", e);
                ApiError::MemoryService
            },
            NoteUpdateError::Provider(e) => ai_service_failure(e),
        }
    }
}

// Detail stays in the logs; callers only learn that the provider failed.
fn ai_service_failure(err: SdkError) -> ApiError {
    error!("AI API call failed: {}", err);
    ApiError::AiService
}

pub type ApiResult<T> = Result<T, ApiError>;
