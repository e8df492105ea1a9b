//! In-process vector store backend.
//!
//! Ranks by term overlap instead of real embeddings, which keeps local runs
//! and tests deterministic. Upsert semantics (including `AlreadyExists` on a
//! duplicate id) mirror the HTTP backend exactly.

use super::{ChunkMetadata, ScoredSnippet, SearchFilter, VectorStore};
use crate::error::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;

#[derive(Clone)]
struct StoredChunk {
    text: String,
    metadata: ChunkMetadata,
}

#[derive(Default)]
pub struct MemoryVectorStore {
    chunks: DashMap<String, StoredChunk>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn score(query_terms: &[String], text: &str) -> f32 {
        if query_terms.is_empty() {
            return 1.0;
        }
        let haystack = text.to_lowercase();
        let hits = query_terms
            .iter()
            .filter(|term| haystack.contains(term.as_str()))
            .count();
        hits as f32 / query_terms.len() as f32
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn search(
        &self,
        query: &str,
        filter: Option<&SearchFilter>,
        limit: usize,
    ) -> Result<Vec<ScoredSnippet>, StoreError> {
        let terms: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(|s| s.to_string())
            .collect();

        let mut hits: Vec<(String, ScoredSnippet)> = self
            .chunks
            .iter()
            .filter(|entry| {
                filter
                    .map(|f| f.matches(&entry.value().metadata))
                    .unwrap_or(true)
            })
            .map(|entry| {
                let chunk = entry.value();
                (
                    entry.key().clone(),
                    ScoredSnippet {
                        text: chunk.text.clone(),
                        score: Self::score(&terms, &chunk.text),
                        metadata: chunk.metadata.clone(),
                    },
                )
            })
            .collect();

        // Stable order: score descending, then id, so results are reproducible.
        hits.sort_by(|(id_a, a), (id_b, b)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| id_a.cmp(id_b))
        });

        Ok(hits
            .into_iter()
            .filter(|(_, hit)| hit.score > 0.0)
            .take(limit)
            .map(|(_, hit)| hit)
            .collect())
    }

    async fn upsert(&self, id: &str, text: &str, metadata: ChunkMetadata) -> Result<(), StoreError> {
        if self.chunks.contains_key(id) {
            return Err(StoreError::AlreadyExists(id.to_string()));
        }
        self.chunks.insert(
            id.to_string(),
            StoredChunk {
                text: text.to_string(),
                metadata,
            },
        );
        Ok(())
    }
}
