//! Retrieval layer.
//!
//! Always searches the general corpus; when the session has registered
//! uploads, additionally searches scoped to the session and merges with
//! session snippets ordered first. Total merged characters are capped at a
//! budget, trimming lowest-ranked hits. Zero results is never an error.

use crate::config::RagConfig;
use crate::error::RagError;
use crate::session::SessionStore;
use crate::store::{ScoredSnippet, SearchFilter, VectorStore};
use crate::types::{RetrievalResult, SourceTag};
use std::collections::HashSet;
use std::sync::Arc;

pub struct Retriever {
    store: Arc<dyn VectorStore>,
    sessions: SessionStore,
    general_limit: usize,
    session_limit: usize,
    char_budget: usize,
    store_timeout: std::time::Duration,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>, sessions: SessionStore, config: &RagConfig) -> Self {
        Self {
            store,
            sessions,
            general_limit: config.retrieval.general_limit,
            session_limit: config.retrieval.session_limit,
            char_budget: config.retrieval.char_budget,
            store_timeout: config.network.store_timeout(),
        }
    }

    pub async fn retrieve(
        &self,
        query: &str,
        session_id: Option<&str>,
    ) -> Result<RetrievalResult, RagError> {
        // Session-scoped hits rank ahead of the general corpus.
        let mut ranked: Vec<(ScoredSnippet, SourceTag)> = Vec::new();

        if let Some(session) = session_id {
            if self.sessions.get_session_context(session).has_uploads() {
                let filter = SearchFilter::for_session(session);
                match self.search_bounded(query, Some(&filter), self.session_limit).await {
                    Ok(hits) => {
                        tracing::debug!(session = %session, hits = hits.len(), "session-scoped search");
                        ranked.extend(hits.into_iter().map(|h| (h, SourceTag::Session)));
                    }
                    Err(e) => {
                        // Absorbed: the general corpus can still answer.
                        tracing::warn!(session = %session, error = %e, "session-scoped search failed");
                    }
                }
            }
        }

        match self.search_bounded(query, None, self.general_limit).await {
            Ok(hits) => {
                ranked.extend(hits.into_iter().map(|h| (h, SourceTag::General)));
            }
            Err(e) => {
                if ranked.is_empty() {
                    tracing::warn!(error = %e, "general corpus search failed, returning empty result");
                } else {
                    tracing::warn!(error = %e, "general corpus search failed, using session hits only");
                }
            }
        }

        Ok(self.merge(ranked))
    }

    async fn search_bounded(
        &self,
        query: &str,
        filter: Option<&SearchFilter>,
        limit: usize,
    ) -> Result<Vec<ScoredSnippet>, crate::error::StoreError> {
        match tokio::time::timeout(self.store_timeout, self.store.search(query, filter, limit))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(crate::error::StoreError::Unavailable(
                "vector search timed out".to_string(),
            )),
        }
    }

    /// Dedup exact snippet text, then take hits in rank order until the
    /// character budget is spent. Lowest-ranked hits are trimmed first by
    /// construction.
    fn merge(&self, ranked: Vec<(ScoredSnippet, SourceTag)>) -> RetrievalResult {
        let mut seen: HashSet<String> = HashSet::new();
        let mut result = RetrievalResult::default();

        for (hit, tag) in ranked {
            let text = hit.text.trim();
            if text.is_empty() || !seen.insert(text.to_string()) {
                continue;
            }
            if result.total_chars + text.len() > self.char_budget {
                break;
            }
            result.total_chars += text.len();
            result.snippets.push(text.to_string());
            result.source_tags.push(tag);
        }

        tracing::debug!(
            snippets = result.snippets.len(),
            total_chars = result.total_chars,
            "retrieval merged"
        );
        result
    }
}
