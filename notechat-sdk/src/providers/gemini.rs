//! Gemini-style content generation
//!
//! `POST {base}/v1beta/models/{model}:generateContent?key=...` with a list of
//! role-tagged contents; the first part of the first candidate is the
//! completion.

use serde::{Deserialize, Serialize};

use super::{Provider, context_preamble};
use crate::errors::{Result, SdkError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiPart {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl GeminiContent {
    fn user_text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![GeminiPart { text: text.into() }],
            role: Some("user".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
}

/// Blocked candidates come back without content
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<GeminiContent>,
}

/// Endpoint without the key; the key travels as a query parameter so the URL
/// built here is safe to log.
pub fn endpoint(base_url: &str, model: &str) -> String {
    format!(
        "{}/v1beta/models/{}:generateContent",
        base_url.trim_end_matches('/'),
        model
    )
}

/// Build the native request. Gemini has no system role in `contents`, so a
/// non-empty context becomes a leading user-role preamble.
pub fn build_request(prompt: &str, context: &str) -> GeminiRequest {
    let mut contents = Vec::with_capacity(2);

    if let Some(preamble) = context_preamble(context) {
        contents.push(GeminiContent::user_text(preamble));
    }
    contents.push(GeminiContent::user_text(prompt));

    GeminiRequest { contents }
}

/// Text of the first part of the first candidate
pub fn extract_text(response: GeminiResponse) -> Result<String> {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .map(|part| part.text)
        .ok_or(SdkError::EmptyResponse {
            provider: Provider::Gemini,
        })
}
