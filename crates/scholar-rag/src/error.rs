//! Error taxonomy for the orchestration core.
//!
//! Chunk- and tool-level failures are absorbed where they happen and logged;
//! only request-level failures (no usable data at all, or the final synthesis
//! call failing) surface as one of these variants.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// Ingestion stored zero chunks: every chunk failed or the input was empty.
    #[error("no content stored for source '{name}'")]
    NoContentStored { name: String },

    /// The LLM returned an empty or whitespace-only completion.
    #[error("LLM returned an empty response")]
    LlmEmptyResponse,

    /// Profile synthesis found no matching person in any source.
    #[error("no profile found for '{name}'")]
    ProfileNotFound { name: String },

    /// A tool call exceeded its timeout. Recovered locally inside the tool
    /// loop; this variant never reaches the request boundary.
    #[error("tool '{tool}' timed out after {secs}s")]
    ToolTimeout { tool: String, secs: u64 },

    /// An external service (vector store, LLM provider) is unreachable or
    /// persistently failing. Surfaced, not retried indefinitely.
    #[error("external service unavailable: {0}")]
    ExternalServiceUnavailable(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T, E = RagError> = std::result::Result<T, E>;

/// Vector store operation errors. `AlreadyExists` is retryable at the
/// ingestion layer, never fatal.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document id '{0}' already exists")]
    AlreadyExists(String),

    #[error("vector store unavailable: {0}")]
    Unavailable(String),

    #[error("vector store request failed: {0}")]
    Request(String),
}

impl From<StoreError> for RagError {
    fn from(e: StoreError) -> Self {
        RagError::ExternalServiceUnavailable(e.to_string())
    }
}
