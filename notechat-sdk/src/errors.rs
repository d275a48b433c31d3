//! Error types for the Notechat SDK
//!
//! This module defines all error types that can occur when talking to a
//! chat-completion provider or to the long-term memory service.

use thiserror::Error;

use crate::providers::Provider;

/// Main error type for the Notechat SDK
#[derive(Error, Debug)]
pub enum SdkError {
    /// The provider tag is not one of the supported providers
    #[error("Unsupported provider: {0} (expected 'openai' or 'gemini')")]
    UnsupportedProvider(String),

    /// Request rejected before it was sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Network-level failure (connect, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a non-success status
    #[error("{provider} API error ({status}): {body}")]
    ProviderStatus {
        /// Provider that failed
        provider: Provider,
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Provider answered successfully but without any completion candidate
    #[error("No response from {provider}")]
    EmptyResponse {
        /// Provider that returned nothing
        provider: Provider,
    },

    /// Response body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Memory service answered with a non-success status
    #[error("Memory API error ({status}): {body}")]
    MemoryStatus {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;

impl SdkError {
    /// Create a new ProviderStatus error
    pub fn provider_status(provider: Provider, status: u16, body: impl Into<String>) -> Self {
        Self::ProviderStatus {
            provider,
            status,
            body: body.into(),
        }
    }

    /// Create a new MemoryStatus error
    pub fn memory_status(status: u16, body: impl Into<String>) -> Self {
        Self::MemoryStatus {
            status,
            body: body.into(),
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ProviderStatus { status, .. } | Self::MemoryStatus { status, .. } => {
                Some(*status)
            },
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if the error is a configuration issue
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::UnsupportedProvider(_) | Self::Config(_))
    }
}
