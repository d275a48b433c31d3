//! In-process test doubles for the completion and memory seams
//!
//! Both doubles are deterministic and never touch the network, so services
//! built on [`CompletionBackend`] and [`MemoryStore`] can be exercised end to
//! end in tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::errors::{Result, SdkError};
use crate::memory::{MemoryRecord, MemoryStore};
use crate::providers::{CompletionBackend, CompletionRequest};
use crate::types::Role;

/// Scripted [`CompletionBackend`].
///
/// Queued replies are returned first, then the default reply. Every request
/// is recorded, including the ones that fail.
pub struct MockCompletionBackend {
    default_reply: String,
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
    failing: AtomicBool,
}

impl MockCompletionBackend {
    pub fn new(default_reply: impl Into<String>) -> Self {
        Self {
            default_reply: default_reply.into(),
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Queue a reply for the next call
    pub fn push_reply(&self, reply: impl Into<String>) {
        self.replies.lock().push_back(reply.into());
    }

    /// Make every following call fail with a provider status error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl Default for MockCompletionBackend {
    fn default() -> Self {
        Self::new("mock reply")
    }
}

#[async_trait]
impl CompletionBackend for MockCompletionBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.requests.lock().push(request.clone());

        if self.failing.load(Ordering::SeqCst) {
            return Err(SdkError::provider_status(
                request.provider,
                500,
                "mock provider failure",
            ));
        }

        Ok(self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.default_reply.clone()))
    }
}

/// A memory write observed by [`InMemoryMemoryStore`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedAdd {
    pub user_id: String,
    pub session_id: String,
    pub content: String,
    pub role: Role,
}

/// [`MemoryStore`] kept in a vector.
///
/// Search is a case-insensitive keyword match (words of three or more
/// characters), ranked by the number of matching words. Every `add` stores
/// the message verbatim as a new record tagged with the session.
pub struct InMemoryMemoryStore {
    records: Mutex<Vec<MemoryRecord>>,
    adds: Mutex<Vec<RecordedAdd>>,
    next_id: AtomicU64,
    fail_search: AtomicBool,
    fail_history: AtomicBool,
    fail_add: AtomicBool,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            adds: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            fail_search: AtomicBool::new(false),
            fail_history: AtomicBool::new(false),
            fail_add: AtomicBool::new(false),
        }
    }

    /// Seed a record
    pub fn insert(&self, record: MemoryRecord) {
        self.records.lock().push(record);
    }

    pub fn set_fail_search(&self, fail: bool) {
        self.fail_search.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_history(&self, fail: bool) {
        self.fail_history.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_add(&self, fail: bool) {
        self.fail_add.store(fail, Ordering::SeqCst);
    }

    pub fn adds(&self) -> Vec<RecordedAdd> {
        self.adds.lock().clone()
    }

    pub fn records(&self) -> Vec<MemoryRecord> {
        self.records.lock().clone()
    }

    /// Poll until at least `count` adds were observed, for up to two seconds.
    /// Memory writes are detached from the request, so tests wait on this.
    pub async fn wait_for_adds(&self, count: usize) -> bool {
        for _ in 0..200 {
            if self.adds.lock().len() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.adds.lock().len() >= count
    }

    fn unavailable() -> SdkError {
        SdkError::memory_status(503, "mock memory service unavailable")
    }

    fn not_found(memory_id: &str) -> SdkError {
        SdkError::memory_status(404, format!("memory {memory_id} not found"))
    }
}

impl Default for InMemoryMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn keywords(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() >= 3)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn search(
        &self,
        user_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<MemoryRecord>> {
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }

        let words = keywords(query);
        let records = self.records.lock();

        let mut scored: Vec<(usize, &MemoryRecord)> = records
            .iter()
            .filter(|record| record.user_id.as_deref() == Some(user_id))
            .filter_map(|record| {
                let content = record.memory.to_lowercase();
                let hits = words.iter().filter(|w| content.contains(w.as_str())).count();
                (hits > 0).then_some((hits, record))
            })
            .collect();

        // Stable sort keeps insertion order between equal scores.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn add(
        &self,
        user_id: &str,
        session_id: &str,
        content: &str,
        role: Role,
    ) -> Result<Vec<MemoryRecord>> {
        if self.fail_add.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }

        let id = format!("mem-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let record = MemoryRecord::new(id, content)
            .with_user(user_id)
            .with_run(session_id);

        self.records.lock().push(record.clone());
        self.adds.lock().push(RecordedAdd {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            content: content.to_string(),
            role,
        });

        Ok(vec![record])
    }

    async fn get_all(&self, user_id: &str) -> Result<Vec<MemoryRecord>> {
        Ok(self
            .records
            .lock()
            .iter()
            .filter(|record| record.user_id.as_deref() == Some(user_id))
            .cloned()
            .collect())
    }

    async fn session_history(
        &self,
        user_id: &str,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>> {
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }

        Ok(self
            .records
            .lock()
            .iter()
            .filter(|record| {
                record.user_id.as_deref() == Some(user_id)
                    && record.run_id.as_deref() == Some(session_id)
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get(&self, memory_id: &str) -> Result<MemoryRecord> {
        self.records
            .lock()
            .iter()
            .find(|record| record.id == memory_id)
            .cloned()
            .ok_or_else(|| Self::not_found(memory_id))
    }

    async fn delete(&self, memory_id: &str) -> Result<()> {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|record| record.id != memory_id);

        if records.len() == before {
            return Err(Self::not_found(memory_id));
        }
        Ok(())
    }

    async fn batch_delete(&self, memory_ids: &[String]) -> Result<()> {
        self.records.lock().retain(|record| !memory_ids.contains(&record.id));
        Ok(())
    }
}
