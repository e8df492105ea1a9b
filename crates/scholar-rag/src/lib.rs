//! Query-routing and RAG orchestration core for an academic research
//! assistant: session-scoped ingestion, deterministic tier classification,
//! budgeted retrieval, multi-tool agentic synthesis, and CV profile
//! building.

pub mod agent;
pub mod chunker;
pub mod config;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod profile;
pub mod rag;
pub mod retrieval;
pub mod scrape;
pub mod session;
pub mod store;
pub mod types;

// Re-export primary types for convenience
pub use config::RagConfig;
pub use error::{RagError, Result, StoreError};
pub use ingest::{IngestReport, IngestSource, Ingestor};
pub use profile::ProfileBuilder;
pub use rag::RagEngine;
pub use retrieval::Retriever;
pub use session::SessionStore;
pub use store::{HttpVectorStore, MemoryVectorStore, VectorStore};
pub use types::{ProfileRecord, QueryEnvelope, RetrievalResult, Tier};

pub use llm::{ApiProvider, ExternalProvider, GenerationConfig, LlmProvider};
