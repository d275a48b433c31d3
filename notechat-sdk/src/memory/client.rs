//! HTTP client for the hosted memory service

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, RequestBuilder};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::types::{
    AddRequest, BatchDeleteRequest, GetRequest, MemoryRecord, SearchRequest, session_filter,
    user_filter,
};
use crate::errors::{Result, SdkError};
use crate::types::{ApiKey, Role};

/// Long-term memory operations, scoped by user and optionally by session
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Semantic search over the user's memories, best match first
    async fn search(&self, user_id: &str, query: &str, top_k: usize)
    -> Result<Vec<MemoryRecord>>;

    /// Store one chat message; the service may extract zero or more memories
    async fn add(
        &self,
        user_id: &str,
        session_id: &str,
        content: &str,
        role: Role,
    ) -> Result<Vec<MemoryRecord>>;

    /// Every memory of the user
    async fn get_all(&self, user_id: &str) -> Result<Vec<MemoryRecord>>;

    /// Memories recorded for one session of the user, at most `limit`
    async fn session_history(
        &self,
        user_id: &str,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>>;

    async fn get(&self, memory_id: &str) -> Result<MemoryRecord>;

    async fn delete(&self, memory_id: &str) -> Result<()>;

    async fn batch_delete(&self, memory_ids: &[String]) -> Result<()>;
}

/// Connection settings for [`MemoryClient`]
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    pub base_url: String,
    pub api_key: ApiKey,
    pub timeout: Duration,
}

impl MemoryConfig {
    pub fn new(api_key: ApiKey) -> Self {
        Self {
            base_url: "https://api.mem0.ai".to_string(),
            api_key,
            timeout: Duration::from_secs(30),
        }
    }
}

/// [`MemoryStore`] backed by the memory service's REST API
#[derive(Clone)]
pub struct MemoryClient {
    http: reqwest::Client,
    base_url: String,
    api_key: ApiKey,
}

impl MemoryClient {
    pub fn new(config: MemoryConfig) -> Result<Self> {
        if config.api_key.is_blank() {
            return Err(SdkError::Config("memory service API key is required".into()));
        }

        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Token {}", self.api_key.expose()),
            )
    }

    async fn send(&self, request: RequestBuilder) -> Result<String> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(SdkError::memory_status(status.as_u16(), body));
        }

        Ok(body)
    }

    async fn fetch(&self, filters: Value) -> Result<Vec<MemoryRecord>> {
        let body = self
            .send(self.request(Method::POST, "/v2/memories/").json(&GetRequest { filters }))
            .await?;
        decode_records(&body)
    }
}

/// Decode a list response; anything but a JSON array of records is an error
pub(crate) fn decode_records(body: &str) -> Result<Vec<MemoryRecord>> {
    Ok(serde_json::from_str(body)?)
}

/// Decode the answer to an add. Anything that is not a JSON array (queued
/// acknowledgements, empty bodies) yields no records.
pub(crate) fn decode_add_ack(body: &str) -> Result<Vec<MemoryRecord>> {
    match serde_json::from_str::<Value>(body) {
        Ok(value @ Value::Array(_)) => Ok(serde_json::from_value(value)?),
        Ok(other) => {
            debug!("Memory service returned a non-list payload: {}", other);
            Ok(Vec::new())
        },
        Err(_) if body.trim().is_empty() => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl MemoryStore for MemoryClient {
    async fn search(
        &self,
        user_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<MemoryRecord>> {
        let request = SearchRequest {
            query,
            filters: user_filter(user_id),
            top_k,
            rerank: true,
        };

        let body = self
            .send(self.request(Method::POST, "/v2/memories/search/").json(&request))
            .await?;
        let records = decode_records(&body)?;

        debug!("Memory search for {} returned {} records", user_id, records.len());
        Ok(records)
    }

    async fn add(
        &self,
        user_id: &str,
        session_id: &str,
        content: &str,
        role: Role,
    ) -> Result<Vec<MemoryRecord>> {
        let request =
            AddRequest::chat_message(user_id, session_id, content, role, Utc::now().timestamp());

        let body = self
            .send(self.request(Method::POST, "/v1/memories/").json(&request))
            .await?;
        decode_add_ack(&body)
    }

    async fn get_all(&self, user_id: &str) -> Result<Vec<MemoryRecord>> {
        self.fetch(user_filter(user_id)).await
    }

    async fn session_history(
        &self,
        user_id: &str,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>> {
        let mut records = self.fetch(session_filter(user_id, session_id)).await?;
        records.truncate(limit);
        Ok(records)
    }

    async fn get(&self, memory_id: &str) -> Result<MemoryRecord> {
        let body = self
            .send(self.request(Method::GET, &format!("/v1/memories/{memory_id}/")))
            .await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn delete(&self, memory_id: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, &format!("/v1/memories/{memory_id}/")))
            .await?;
        Ok(())
    }

    async fn batch_delete(&self, memory_ids: &[String]) -> Result<()> {
        if memory_ids.is_empty() {
            return Ok(());
        }

        self.send(
            self.request(Method::DELETE, "/v1/batch/")
                .json(&BatchDeleteRequest { memory_ids }),
        )
        .await?;
        Ok(())
    }
}
