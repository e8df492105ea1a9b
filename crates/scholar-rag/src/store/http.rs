//! HTTP client for the external vector store's JSON document API.

use super::{ChunkMetadata, ScoredSnippet, SearchFilter, VectorStore};
use crate::error::StoreError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub struct HttpVectorStore {
    base_url: String,
    token: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<ScoredSnippet>,
}

impl HttpVectorStore {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn map_send_error(endpoint: &str, e: reqwest::Error) -> StoreError {
        if e.is_timeout() {
            StoreError::Unavailable(format!("request to {} timed out", endpoint))
        } else if e.is_connect() {
            StoreError::Unavailable(format!("failed to connect to {}: {}", endpoint, e))
        } else {
            StoreError::Request(format!("request to {} failed: {}", endpoint, e))
        }
    }
}

#[async_trait]
impl VectorStore for HttpVectorStore {
    async fn search(
        &self,
        query: &str,
        filter: Option<&SearchFilter>,
        limit: usize,
    ) -> Result<Vec<ScoredSnippet>, StoreError> {
        let endpoint = self.endpoint("search");
        let body = json!({
            "query": query,
            "filter": filter,
            "limit": limit,
        });

        let response = self
            .client
            .post(&endpoint)
            .header("Authorization", format!("Bearer {}", self.token))
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::map_send_error(&endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Request(format!(
                "search returned HTTP {} from {}",
                status, endpoint
            )));
        }

        // Guard against HTML error pages from intermediate proxies.
        let text = response
            .text()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        if text.trim_start().starts_with('<') {
            return Err(StoreError::Unavailable(format!(
                "{} returned HTML instead of JSON — service may be down",
                endpoint
            )));
        }

        let parsed: SearchResponse = serde_json::from_str(&text)
            .map_err(|e| StoreError::Request(format!("bad search response: {}", e)))?;

        tracing::debug!(query = %query, hits = parsed.results.len(), "vector store search");
        Ok(parsed.results)
    }

    async fn upsert(&self, id: &str, text: &str, metadata: ChunkMetadata) -> Result<(), StoreError> {
        let endpoint = self.endpoint("upsert");
        let body = json!({
            "id": id,
            "text": text,
            "metadata": metadata,
        });

        let response = self
            .client
            .post(&endpoint)
            .header("Authorization", format!("Bearer {}", self.token))
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::map_send_error(&endpoint, e))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(StoreError::AlreadyExists(id.to_string())),
            status => Err(StoreError::Request(format!(
                "upsert of '{}' returned HTTP {}",
                id, status
            ))),
        }
    }
}
