//! Single-call lookup formatter.
//!
//! Exactly one bounded model call, constrained to the supplied context and a
//! word cap. Deterministic settings keep repeated lookups reproducible.

use crate::config::TierConfig;
use crate::error::RagError;
use crate::llm::{GenerationConfig, LlmProvider};
use crate::types::RetrievalResult;
use anyhow::anyhow;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct LookupFormatter {
    llm: Arc<dyn LlmProvider>,
    max_words: usize,
    max_tokens: usize,
}

impl LookupFormatter {
    pub fn new(llm: Arc<dyn LlmProvider>, config: &TierConfig) -> Self {
        Self {
            llm,
            max_words: config.lookup_max_words,
            max_tokens: config.lookup_max_tokens,
        }
    }

    pub async fn format_lookup(
        &self,
        query: &str,
        retrieval: &RetrievalResult,
        cancel: &CancellationToken,
    ) -> Result<String, RagError> {
        let prompt = self.build_prompt(query, retrieval);
        let config = GenerationConfig::deterministic(self.max_tokens);

        let response = tokio::select! {
            response = self.llm.complete(&prompt, &config) => response?,
            _ = cancel.cancelled() => {
                return Err(anyhow!("request cancelled during lookup").into());
            }
        };
        let trimmed = response.trim();
        if trimmed.is_empty() {
            return Err(RagError::LlmEmptyResponse);
        }

        Ok(cap_words(trimmed, self.max_words))
    }

    fn build_prompt(&self, query: &str, retrieval: &RetrievalResult) -> String {
        format!(
            "Answer the question using ONLY the context below. \
             Do not fabricate facts that are not in the context. \
             If the context does not contain the answer, say so briefly. \
             Keep the answer under {} words.\n\n\
             === CONTEXT ===\n{}\n=== END CONTEXT ===\n\n\
             Question: {}\n\nAnswer:",
            self.max_words,
            retrieval.joined(),
            query
        )
    }
}

/// Truncate to at most `max_words` whitespace-separated words, never cutting
/// inside a word.
fn cap_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return text.to_string();
    }
    tracing::debug!(
        words = words.len(),
        cap = max_words,
        "lookup answer truncated at word cap"
    );
    words[..max_words].join(" ")
}
