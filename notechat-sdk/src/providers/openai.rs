//! OpenAI-style chat completions
//!
//! `POST {base}/v1/chat/completions` with a role-tagged message list and a
//! bearer key; the first choice's message content is the completion.

use serde::{Deserialize, Serialize};

use super::{Provider, ProviderOptions, context_preamble};
use crate::errors::{Result, SdkError};

/// One message of the request conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiMessage {
    pub role: String,
    pub content: String,
}

impl OpenAiMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OpenAiRequest {
    pub model: String,
    pub messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiResponse {
    #[serde(default)]
    pub choices: Vec<OpenAiChoice>,
    #[serde(default)]
    pub usage: Option<OpenAiUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiChoice {
    pub message: OpenAiResponseMessage,
}

/// Response messages may carry a null content (refusals, tool calls)
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiResponseMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

pub fn endpoint(base_url: &str) -> String {
    format!("{}/v1/chat/completions", base_url.trim_end_matches('/'))
}

/// Build the native request. A non-empty context becomes a leading
/// `system` message.
pub fn build_request(
    prompt: &str,
    context: &str,
    model: &str,
    options: &ProviderOptions,
) -> OpenAiRequest {
    let mut messages = Vec::with_capacity(2);

    if let Some(preamble) = context_preamble(context) {
        messages.push(OpenAiMessage::new("system", preamble));
    }
    messages.push(OpenAiMessage::new("user", prompt));

    OpenAiRequest {
        model: model.to_string(),
        messages,
        max_tokens: Some(options.max_tokens),
        temperature: Some(options.temperature),
    }
}

/// Text of the first choice
pub fn extract_text(response: OpenAiResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(SdkError::EmptyResponse {
            provider: Provider::OpenAi,
        })
}
