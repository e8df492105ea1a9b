//! Vector store abstraction.
//!
//! The index itself is externally provided; this module is the client seam.
//! `HttpVectorStore` talks to a JSON document API; `MemoryVectorStore` is an
//! in-process backend for tests and local runs.

mod http;
mod memory;

pub use http::HttpVectorStore;
pub use memory::MemoryVectorStore;

use crate::error::StoreError;
use crate::types::SourceKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Metadata stored alongside every chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub session_id: Option<String>,
    pub source_name: String,
    pub source_kind: SourceKind,
    pub sequence_index: usize,
}

/// One ranked search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredSnippet {
    pub text: String,
    pub score: f32,
    pub metadata: ChunkMetadata,
}

/// Metadata filter for scoped searches. `None` fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilter {
    pub session_id: Option<String>,
    pub source_kind: Option<SourceKind>,
}

impl SearchFilter {
    /// Scope a search to one session's uploads.
    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            source_kind: None,
        }
    }

    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        if let Some(session) = &self.session_id {
            if metadata.session_id.as_deref() != Some(session.as_str()) {
                return false;
            }
        }
        if let Some(kind) = self.source_kind {
            if metadata.source_kind != kind {
                return false;
            }
        }
        true
    }
}

/// Client interface to the externally provided vector index.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Ranked similarity search, best hits first. Empty result is not an error.
    async fn search(
        &self,
        query: &str,
        filter: Option<&SearchFilter>,
        limit: usize,
    ) -> Result<Vec<ScoredSnippet>, StoreError>;

    /// Store one chunk under `id`. `StoreError::AlreadyExists` is retryable:
    /// the ingestion layer regenerates the id and tries again.
    async fn upsert(&self, id: &str, text: &str, metadata: ChunkMetadata) -> Result<(), StoreError>;
}
