//! Session Context Store
//!
//! Process-wide map from session id to the document/URL ids uploaded in that
//! session. Written only by ingestion, read by retrieval and the agent's
//! document-search tool. Add-only per key; concurrent writers never corrupt
//! the sets. Unknown session ids are not an error — callers fall back to the
//! general corpus.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Snapshot of one session's registered uploads.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub document_ids: HashSet<String>,
    pub url_ids: HashSet<String>,
}

impl SessionContext {
    pub fn has_uploads(&self) -> bool {
        !self.document_ids.is_empty() || !self.url_ids.is_empty()
    }
}

#[derive(Debug, Default)]
struct SessionEntry {
    context: SessionContext,
    last_touched: Option<DateTime<Utc>>,
}

/// Concurrent session store. Cheap to clone; all clones share state.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, SessionEntry>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an uploaded document id against a session.
    pub fn set_session_document(&self, session_id: &str, doc_id: impl Into<String>) {
        let mut entry = self.sessions.entry(session_id.to_string()).or_default();
        entry.context.document_ids.insert(doc_id.into());
        entry.last_touched = Some(Utc::now());
    }

    /// Register an uploaded URL id against a session.
    pub fn set_session_url(&self, session_id: &str, url_id: impl Into<String>) {
        let mut entry = self.sessions.entry(session_id.to_string()).or_default();
        entry.context.url_ids.insert(url_id.into());
        entry.last_touched = Some(Utc::now());
    }

    /// Snapshot the context for a session. Returns an empty context for
    /// unknown ids so callers can fall back to the general corpus.
    pub fn get_session_context(&self, session_id: &str) -> SessionContext {
        self.sessions
            .get(session_id)
            .map(|entry| entry.context.clone())
            .unwrap_or_default()
    }

    /// Drop sessions idle longer than `ttl_secs`. Returns how many were
    /// evicted. Callers decide the sweep cadence.
    pub fn sweep_expired(&self, ttl_secs: u64) -> usize {
        let cutoff = Utc::now() - Duration::seconds(ttl_secs as i64);
        // Counted inside the retain closure: a before/after len diff is
        // unreliable while other threads keep inserting.
        let evicted = AtomicUsize::new(0);
        self.sessions.retain(|_, entry| {
            let keep = match entry.last_touched {
                Some(touched) => touched >= cutoff,
                None => true,
            };
            if !keep {
                evicted.fetch_add(1, Ordering::Relaxed);
            }
            keep
        });
        let evicted = evicted.into_inner();
        if evicted > 0 {
            tracing::info!(evicted, ttl_secs, "session store sweep complete");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_session_yields_empty_context() {
        let store = SessionStore::new();
        let ctx = store.get_session_context("nope");
        assert!(!ctx.has_uploads());
    }

    #[test]
    fn registers_documents_and_urls_separately() {
        let store = SessionStore::new();
        store.set_session_document("s1", "doc_a");
        store.set_session_url("s1", "url_a");
        store.set_session_document("s2", "doc_b");

        let ctx = store.get_session_context("s1");
        assert!(ctx.document_ids.contains("doc_a"));
        assert!(ctx.url_ids.contains("url_a"));
        assert!(!ctx.document_ids.contains("doc_b"));
    }

    #[test]
    fn duplicate_registration_is_idempotent() {
        let store = SessionStore::new();
        store.set_session_document("s1", "doc_a");
        store.set_session_document("s1", "doc_a");
        assert_eq!(store.get_session_context("s1").document_ids.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_writes_to_same_session_lose_nothing() {
        let store = SessionStore::new();
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.set_session_document("shared", format!("doc_{}", i));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.get_session_context("shared").document_ids.len(), 32);
    }

    #[test]
    fn sweep_keeps_fresh_sessions() {
        let store = SessionStore::new();
        store.set_session_document("fresh", "doc");
        assert_eq!(store.sweep_expired(3600), 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn sweep_evicts_idle_sessions() {
        let store = SessionStore::new();
        store.set_session_document("idle", "doc");
        store.set_session_url("also_idle", "url");
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        // ttl of zero: anything touched before this instant is idle.
        assert_eq!(store.sweep_expired(0), 2);
        assert!(store.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sweep_tolerates_concurrent_inserts() {
        let store = SessionStore::new();
        for i in 0..64 {
            store.set_session_document(&format!("old_{}", i), "doc");
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..256 {
                    store.set_session_document(&format!("new_{}", i), "doc");
                    tokio::task::yield_now().await;
                }
            })
        };

        // The count reflects only entries the sweep itself dropped, no
        // matter how many inserts land mid-retain.
        let evicted = store.sweep_expired(0);
        writer.await.unwrap();
        assert!(evicted >= 64);
        assert!(store.get_session_context("new_255").has_uploads());
    }
}
