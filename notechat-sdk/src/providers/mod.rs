//! Chat-completion providers
//!
//! Every provider is a variant of [`Provider`] paired with two pure functions
//! in its own module: `build_request` (prompt + context + model into the
//! native request shape) and `extract_text` (native response into the first
//! completion's text). [`ProviderClient`] owns the HTTP exchange and is the
//! only place that touches the network.
//!
//! Adding a provider means adding a variant, its module, and one match arm in
//! [`ProviderClient::complete`]; callers never change.

pub mod gemini;
pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use crate::errors::{Result, SdkError};
use crate::types::ApiKey;

const CONTEXT_HEADER: &str = "Context from previous conversations:";

/// Supported chat-completion providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "gemini")]
    Gemini,
}

impl Provider {
    /// All providers, in display order
    pub const ALL: [Provider; 2] = [Provider::OpenAi, Provider::Gemini];

    /// Tag used on the wire and in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Gemini => "gemini",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "openai" => Ok(Provider::OpenAi),
            "gemini" => Ok(Provider::Gemini),
            other => Err(SdkError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// Preamble carrying retrieved context, or `None` when there is nothing to say
pub(crate) fn context_preamble(context: &str) -> Option<String> {
    if context.trim().is_empty() {
        None
    } else {
        Some(format!("{CONTEXT_HEADER}\n{context}"))
    }
}

/// Sampling options sent to providers that accept them
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProviderOptions {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            max_tokens: 1000,
            temperature: 0.7,
        }
    }
}

/// A single completion call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub provider: Provider,
    /// Provider-specific model name, chosen by the caller
    pub model: String,
    pub prompt: String,
    /// Retrieved context; empty means no preamble is sent
    pub context: String,
    pub api_key: ApiKey,
}

/// Anything that can turn a [`CompletionRequest`] into completion text
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Endpoints and limits for [`ProviderClient`]
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub openai_base_url: String,
    pub gemini_base_url: String,
    pub timeout: Duration,
    pub options: ProviderOptions,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            openai_base_url: "https://api.openai.com".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout: Duration::from_secs(60),
            options: ProviderOptions::default(),
        }
    }
}

/// HTTP client for all providers. Cheap to share: the inner
/// `reqwest::Client` pools connections.
#[derive(Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl ProviderClient {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn send(&self, provider: Provider, request: reqwest::RequestBuilder) -> Result<String> {
        // Gemini keys live in the query string; strip URLs from transport errors.
        let response = request
            .send()
            .await
            .map_err(|e| SdkError::Http(e.without_url()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SdkError::Http(e.without_url()))?;

        if !status.is_success() {
            warn!("{} returned status {}", provider, status);
            return Err(SdkError::provider_status(provider, status.as_u16(), body));
        }

        Ok(body)
    }
}

#[async_trait]
impl CompletionBackend for ProviderClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        if request.prompt.trim().is_empty() {
            return Err(SdkError::InvalidRequest("prompt must not be empty".into()));
        }

        debug!(
            "Calling {} model {} (context: {} chars)",
            request.provider,
            request.model,
            request.context.len()
        );

        match request.provider {
            Provider::OpenAi => {
                let body = openai::build_request(
                    &request.prompt,
                    &request.context,
                    &request.model,
                    &self.config.options,
                );
                let builder = self
                    .http
                    .post(openai::endpoint(&self.config.openai_base_url))
                    .bearer_auth(request.api_key.expose())
                    .json(&body);

                let raw = self.send(Provider::OpenAi, builder).await?;
                let response: openai::OpenAiResponse = serde_json::from_str(&raw)?;
                if let Some(usage) = &response.usage {
                    debug!("openai usage: {} total tokens", usage.total_tokens);
                }
                openai::extract_text(response)
            },
            Provider::Gemini => {
                let body = gemini::build_request(&request.prompt, &request.context);
                let builder = self
                    .http
                    .post(gemini::endpoint(
                        &self.config.gemini_base_url,
                        &request.model,
                    ))
                    .query(&[("key", request.api_key.expose())])
                    .json(&body);

                let raw = self.send(Provider::Gemini, builder).await?;
                let response: gemini::GeminiResponse = serde_json::from_str(&raw)?;
                gemini::extract_text(response)
            },
        }
    }
}
