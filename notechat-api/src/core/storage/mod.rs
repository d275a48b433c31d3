//! Storage abstractions for users, notes and chat history
//!
//! ## Available Backends
//!
//! - `memory`: In-memory storage using HashMap/DashMap (default)
//! - `neo4j`: Neo4j graph database storage

mod memory;
pub mod neo4j;
mod traits;

use anyhow::Result;
use std::sync::Arc;

use crate::core::config::{StorageBackend, StorageConfig};

pub use memory::*;
pub use neo4j::{Neo4jChatStore, Neo4jClient, Neo4jNoteStore, Neo4jUserStore};
pub use traits::*;

/// The three stores the handlers work against
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub notes: Arc<dyn NoteStore>,
    pub chats: Arc<dyn ChatStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryUserStore::new()),
            notes: Arc::new(InMemoryNoteStore::new()),
            chats: Arc::new(InMemoryChatStore::new()),
        }
    }

    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        match config.backend {
            StorageBackend::Memory => Ok(Self::in_memory()),
            StorageBackend::Neo4j => {
                let client = Neo4jClient::new(&config.neo4j).await?;
                Ok(Self {
                    users: Arc::new(Neo4jUserStore::new(client.clone())),
                    notes: Arc::new(Neo4jNoteStore::new(client.clone())),
                    chats: Arc::new(Neo4jChatStore::new(client)),
                })
            },
        }
    }
}
