//! Detached memory writes.
//!
//! A single worker drains a bounded queue and forwards each write to the
//! memory service. Enqueueing never blocks a request: a full or closed queue
//! drops the write with a warning. Failed writes are logged and discarded.

use notechat_sdk::{MemoryStore, Role};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, warn};

/// One chat message to record in long-term memory
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryWrite {
    pub user_id: String,
    pub session_id: String,
    pub content: String,
    pub role: Role,
}

#[derive(Clone)]
pub struct MemoryWriter {
    tx: mpsc::Sender<MemoryWrite>,
}

impl MemoryWriter {
    /// Start the worker on the current runtime
    pub fn spawn(store: Arc<dyn MemoryStore>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(run_worker(store, rx));
        Self { tx }
    }

    /// Queue a write; returns false when it was dropped
    pub fn enqueue(&self, write: MemoryWrite) -> bool {
        match self.tx.try_send(write) {
            Ok(()) => true,
            Err(TrySendError::Full(write)) => {
                warn!(
                    session_id = %write.session_id,
                    "Memory write queue full, dropping {} message",
                    write.role
                );
                false
            },
            Err(TrySendError::Closed(write)) => {
                warn!(
                    session_id = %write.session_id,
                    "Memory writer stopped, dropping {} message",
                    write.role
                );
                false
            },
        }
    }
}

async fn run_worker(store: Arc<dyn MemoryStore>, mut rx: mpsc::Receiver<MemoryWrite>) {
    while let Some(write) = rx.recv().await {
        match store
            .add(&write.user_id, &write.session_id, &write.content, write.role)
            .await
        {
            Ok(records) => debug!(
                session_id = %write.session_id,
                "Stored {} message, {} memories extracted",
                write.role,
                records.len()
            ),
            Err(e) => error!(
                session_id = %write.session_id,
                "Failed to store {} message in memory: {}",
                write.role,
                e
            ),
        }
    }
    debug!("Memory writer stopped");
}
