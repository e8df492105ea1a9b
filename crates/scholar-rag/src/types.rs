use serde::{Deserialize, Serialize};

/// A user query, optionally scoped to a session with uploaded sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryEnvelope {
    pub query_text: String,
    pub session_id: Option<String>,
    /// Recent conversation turns, newest last. Used for pronoun resolution.
    #[serde(default)]
    pub conversation_history: Vec<ConversationTurn>,
}

impl QueryEnvelope {
    pub fn new(query_text: impl Into<String>) -> Self {
        Self {
            query_text: query_text.into(),
            session_id: None,
            conversation_history: Vec::new(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// One prior exchange in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub user: String,
    pub assistant: String,
}

/// What kind of uploaded source a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Document,
    Url,
}

/// A bounded slice of ingested text, stored as one vector-searchable unit.
/// Immutable once stored; `chunk_id` is globally unique across re-uploads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub chunk_id: String,
    pub session_id: Option<String>,
    pub source_name: String,
    pub source_kind: SourceKind,
    pub sequence_index: usize,
    pub text: String,
}

/// Origin of a retrieved snippet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    /// From the caller's own session-scoped uploads.
    Session,
    /// From the shared general corpus.
    General,
}

/// Merged retrieval output. `total_chars` drives tier selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Ranked snippets, session-scoped ones first.
    pub snippets: Vec<String>,
    pub total_chars: usize,
    /// Per-snippet origin, parallel to `snippets`.
    pub source_tags: Vec<SourceTag>,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    /// All snippet text joined for prompt construction.
    pub fn joined(&self) -> String {
        self.snippets.join("\n---\n")
    }
}

/// The three response strategies, chosen per query by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    /// Direct extraction from retrieved context, no model call.
    SimpleList,
    /// One bounded model call over retrieved context.
    BasicLookup,
    /// Multi-tool agentic synthesis.
    Complex,
}

/// One publication entry on a profile. The list on a record is capped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    pub title: String,
    pub venue: Option<String>,
    pub year: Option<u16>,
    pub citations: Option<u32>,
}

/// Which source a profile field was filled from, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    SessionConversation,
    InternalDatabase,
    ExternalWeb,
}

/// Normalized researcher profile for external document rendering.
/// Core's responsibility ends at this record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub name: String,
    pub titles: Vec<String>,
    pub affiliations: Vec<String>,
    pub metrics: ProfileMetrics,
    pub research_areas: Vec<String>,
    pub education: Vec<String>,
    pub positions: Vec<String>,
    pub publications: Vec<Publication>,
    pub awards: Vec<String>,
    pub external_links: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileMetrics {
    pub total_citations: Option<u32>,
    pub h_index: Option<u32>,
    pub i10_index: Option<u32>,
}
