//! Document ingestion.
//!
//! Splits extracted text into bounded chunks and stores each under a
//! collision-free id scoped to the session. The random suffix, not the
//! filename, guarantees uniqueness: re-uploading an identically named file
//! produces a fresh id family and never collides with the first upload.
//!
//! Text extraction from PDFs/URLs happens upstream; this module only sees
//! plain text.

use crate::chunker::TextChunker;
use crate::config::RagConfig;
use crate::error::{RagError, StoreError};
use crate::session::SessionStore;
use crate::store::{ChunkMetadata, VectorStore};
use crate::types::SourceKind;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Extracted text ready for ingestion.
#[derive(Debug, Clone)]
pub struct IngestSource {
    pub name: String,
    pub kind: SourceKind,
    pub text: String,
}

impl IngestSource {
    pub fn document(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SourceKind::Document,
            text: text.into(),
        }
    }

    pub fn url(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: url.into(),
            kind: SourceKind::Url,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub chunk_count: usize,
    pub ids: Vec<String>,
    /// Chunks dropped after the retry also conflicted or the store failed.
    pub skipped: usize,
}

pub struct Ingestor {
    store: Arc<dyn VectorStore>,
    sessions: SessionStore,
    chunker: TextChunker,
    store_timeout: std::time::Duration,
}

impl Ingestor {
    pub fn new(store: Arc<dyn VectorStore>, sessions: SessionStore, config: &RagConfig) -> Self {
        Self {
            store,
            sessions,
            chunker: TextChunker::from_config(&config.chunking),
            store_timeout: config.network.store_timeout(),
        }
    }

    /// Ingest one extracted source into the vector store, registering the new
    /// chunk ids against the session. A single chunk's failure never aborts
    /// the batch; `NoContentStored` is returned only when nothing landed.
    pub async fn ingest(
        &self,
        source: IngestSource,
        session_id: Option<&str>,
    ) -> Result<IngestReport, RagError> {
        let pieces = self.chunker.chunk(&source.text);
        if pieces.is_empty() {
            return Err(RagError::NoContentStored { name: source.name });
        }

        let scope = session_id.unwrap_or("default");
        let batch_suffix = short_suffix();

        let mut ids = Vec::with_capacity(pieces.len());
        let mut skipped = 0usize;

        for piece in &pieces {
            let metadata = ChunkMetadata {
                session_id: session_id.map(|s| s.to_string()),
                source_name: source.name.clone(),
                source_kind: source.kind,
                sequence_index: piece.index,
            };

            let first_id = format!("{}_{}_{}", scope, batch_suffix, piece.index);
            match self.store_chunk(&first_id, &piece.text, metadata).await {
                Ok(stored_id) => {
                    self.register(session_id, &stored_id, source.kind);
                    ids.push(stored_id);
                }
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(
                        chunk = %first_id,
                        source = %source.name,
                        error = %e,
                        "skipping chunk after failed store"
                    );
                }
            }
        }

        if ids.is_empty() {
            return Err(RagError::NoContentStored { name: source.name });
        }

        tracing::info!(
            source = %source.name,
            stored = ids.len(),
            skipped,
            "ingestion complete"
        );

        Ok(IngestReport {
            chunk_count: ids.len(),
            ids,
            skipped,
        })
    }

    /// Insert one chunk: on an `AlreadyExists` conflict, regenerate the id
    /// (fresh suffix plus a timestamp) and retry exactly once. Returns the id
    /// the chunk was actually stored under.
    async fn store_chunk(
        &self,
        id: &str,
        text: &str,
        metadata: ChunkMetadata,
    ) -> Result<String, StoreError> {
        match self.upsert_bounded(id, text, metadata.clone()).await {
            Ok(()) => Ok(id.to_string()),
            Err(StoreError::AlreadyExists(_)) => {
                let scope = metadata.session_id.as_deref().unwrap_or("default");
                let retry_id = format!(
                    "{}_{}_{}_{}",
                    scope,
                    short_suffix(),
                    Utc::now().timestamp_millis(),
                    metadata.sequence_index
                );
                tracing::debug!(original = %id, retry = %retry_id, "chunk id conflict, retrying once");
                self.upsert_bounded(&retry_id, text, metadata).await?;
                Ok(retry_id)
            }
            Err(e) => Err(e),
        }
    }

    async fn upsert_bounded(
        &self,
        id: &str,
        text: &str,
        metadata: ChunkMetadata,
    ) -> Result<(), StoreError> {
        match tokio::time::timeout(self.store_timeout, self.store.upsert(id, text, metadata)).await
        {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(format!(
                "upsert of '{}' timed out",
                id
            ))),
        }
    }

    fn register(&self, session_id: Option<&str>, chunk_id: &str, kind: SourceKind) {
        if let Some(session) = session_id {
            match kind {
                SourceKind::Document => self.sessions.set_session_document(session, chunk_id),
                SourceKind::Url => self.sessions.set_session_url(session, chunk_id),
            }
        }
    }
}

fn short_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryVectorStore;

    fn sample_text() -> String {
        "The department hosts several research laboratories. ".repeat(120)
    }

    fn ingestor(store: Arc<MemoryVectorStore>, sessions: SessionStore) -> Ingestor {
        Ingestor::new(store, sessions, &RagConfig::default())
    }

    #[tokio::test]
    async fn ingest_stores_chunks_and_registers_session() {
        let store = Arc::new(MemoryVectorStore::new());
        let sessions = SessionStore::new();
        let ing = ingestor(store.clone(), sessions.clone());

        let report = ing
            .ingest(IngestSource::document("paper.pdf", sample_text()), Some("s1"))
            .await
            .unwrap();

        assert!(report.chunk_count > 1);
        assert_eq!(report.skipped, 0);
        assert_eq!(store.len(), report.chunk_count);
        assert_eq!(
            sessions.get_session_context("s1").document_ids.len(),
            report.chunk_count
        );
        for id in &report.ids {
            assert!(id.starts_with("s1_"));
        }
    }

    #[tokio::test]
    async fn double_ingest_of_same_file_never_collides() {
        let store = Arc::new(MemoryVectorStore::new());
        let sessions = SessionStore::new();
        let ing = ingestor(store.clone(), sessions.clone());

        let first = ing
            .ingest(IngestSource::document("same.pdf", sample_text()), Some("s1"))
            .await
            .unwrap();
        let second = ing
            .ingest(IngestSource::document("same.pdf", sample_text()), Some("s1"))
            .await
            .unwrap();

        assert_eq!(first.chunk_count, second.chunk_count);
        assert_eq!(first.skipped + second.skipped, 0);
        assert_eq!(store.len(), first.chunk_count * 2);
    }

    #[tokio::test]
    async fn empty_source_reports_no_content_stored() {
        let store = Arc::new(MemoryVectorStore::new());
        let ing = ingestor(store, SessionStore::new());

        let err = ing
            .ingest(IngestSource::document("empty.pdf", "   "), Some("s1"))
            .await
            .unwrap_err();
        match err {
            RagError::NoContentStored { name } => assert_eq!(name, "empty.pdf"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn url_ingest_registers_url_ids() {
        let store = Arc::new(MemoryVectorStore::new());
        let sessions = SessionStore::new();
        let ing = ingestor(store, sessions.clone());

        ing.ingest(
            IngestSource::url("https://example.org/profile", sample_text()),
            Some("s2"),
        )
        .await
        .unwrap();

        let ctx = sessions.get_session_context("s2");
        assert!(ctx.document_ids.is_empty());
        assert!(!ctx.url_ids.is_empty());
    }

    /// Store double that reports a conflict on the first upsert of every id,
    /// forcing the regenerate-and-retry path.
    struct ConflictOnceStore {
        inner: MemoryVectorStore,
        conflicts_remaining: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl VectorStore for ConflictOnceStore {
        async fn search(
            &self,
            query: &str,
            filter: Option<&crate::store::SearchFilter>,
            limit: usize,
        ) -> Result<Vec<crate::store::ScoredSnippet>, StoreError> {
            self.inner.search(query, filter, limit).await
        }

        async fn upsert(
            &self,
            id: &str,
            text: &str,
            metadata: ChunkMetadata,
        ) -> Result<(), StoreError> {
            use std::sync::atomic::Ordering;
            let remaining = self.conflicts_remaining.load(Ordering::SeqCst);
            if remaining > 0 {
                self.conflicts_remaining.store(remaining - 1, Ordering::SeqCst);
                return Err(StoreError::AlreadyExists(id.to_string()));
            }
            self.inner.upsert(id, text, metadata).await
        }
    }

    #[tokio::test]
    async fn conflicting_ids_are_regenerated_once_and_stored() {
        let store = Arc::new(ConflictOnceStore {
            inner: MemoryVectorStore::new(),
            conflicts_remaining: std::sync::atomic::AtomicUsize::new(1),
        });
        let ing = Ingestor::new(store.clone(), SessionStore::new(), &RagConfig::default());

        let report = ing
            .ingest(IngestSource::document("clash.pdf", sample_text()), Some("s1"))
            .await
            .unwrap();

        // First chunk conflicted once and was retried under a new id; nothing skipped.
        assert_eq!(report.skipped, 0);
        assert_eq!(store.inner.len(), report.chunk_count);
    }

    #[tokio::test]
    async fn sessionless_ingest_uses_default_scope() {
        let store = Arc::new(MemoryVectorStore::new());
        let sessions = SessionStore::new();
        let ing = ingestor(store, sessions.clone());

        let report = ing
            .ingest(IngestSource::document("corpus.txt", sample_text()), None)
            .await
            .unwrap();
        assert!(report.ids.iter().all(|id| id.starts_with("default_")));
        assert!(sessions.is_empty());
    }
}
