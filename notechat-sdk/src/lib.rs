//! # Notechat SDK
//!
//! Client-side plumbing for the Notechat service: chat completions from
//! hosted LLM providers and per-user long-term memory from a hosted memory
//! service.
//!
//! ## Features
//!
//! - **Provider Adapter**: one request shape for OpenAI-style and
//!   Gemini-style completion APIs ([`ProviderClient`])
//! - **Memory Client**: search, add, list and delete memories ([`MemoryClient`])
//! - **Context Assembly**: turn retrieved memories into a prompt preamble
//! - **Test doubles**: scripted backends in [`mock`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use notechat_sdk::{
//!     ApiKey, CompletionBackend, CompletionRequest, Provider, ProviderClient, ProviderConfig,
//!     Result,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = ProviderClient::new(ProviderConfig::default())?;
//!     let reply = client
//!         .complete(&CompletionRequest {
//!             provider: "openai".parse::<Provider>()?,
//!             model: "gpt-4o-mini".to_string(),
//!             prompt: "What is 2 + 2?".to_string(),
//!             context: String::new(),
//!             api_key: ApiKey::new("sk-..."),
//!         })
//!         .await?;
//!     println!("{reply}");
//!     Ok(())
//! }
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

pub mod context;
mod errors;
pub mod memory;
pub mod mock;
pub mod providers;
mod types;

pub use context::build_context;
pub use errors::{Result, SdkError};
pub use memory::{MemoryClient, MemoryConfig, MemoryRecord, MemoryStore};
pub use providers::{
    CompletionBackend, CompletionRequest, Provider, ProviderClient, ProviderConfig,
    ProviderOptions,
};
pub use types::{ApiKey, Role};
