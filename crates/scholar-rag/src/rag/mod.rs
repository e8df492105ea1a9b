//! Query pipeline.
//!
//! One entry point, [`RagEngine::answer`]: resolve follow-up pronouns,
//! retrieve, classify, dispatch to the matching tier, then post-process the
//! answer. Greetings short-circuit before retrieval.

pub mod classifier;
pub mod list_formatter;
pub mod lookup;
pub mod rewrite;

pub use classifier::QueryClassifier;
pub use list_formatter::ListFormatter;
pub use lookup::LookupFormatter;
pub use rewrite::QueryRewriter;

use crate::agent::{AgentContext, AgentOrchestrator, ToolRegistry};
use crate::config::RagConfig;
use crate::error::RagError;
use crate::llm::LlmProvider;
use crate::retrieval::Retriever;
use crate::session::SessionStore;
use crate::store::VectorStore;
use crate::types::{QueryEnvelope, Tier};
use regex::Regex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const EMERGENCY_FALLBACK: &str = "I ran into a problem answering that. \
Please rephrase the question, or upload a document with the relevant \
information and ask again.";

pub struct RagEngine {
    retriever: Retriever,
    classifier: QueryClassifier,
    list_formatter: ListFormatter,
    lookup_formatter: LookupFormatter,
    orchestrator: AgentOrchestrator,
    rewriter: QueryRewriter,
    answer_filter: AnswerFilter,
    sessions: SessionStore,
    session_ttl_secs: u64,
    answer_max_chars: usize,
}

impl RagEngine {
    pub fn new(
        store: Arc<dyn VectorStore>,
        sessions: SessionStore,
        llm: Arc<dyn LlmProvider>,
        registry: ToolRegistry,
        config: &RagConfig,
    ) -> Self {
        Self {
            retriever: Retriever::new(store, sessions.clone(), config),
            classifier: QueryClassifier::new(&config.classifier),
            list_formatter: ListFormatter::new(),
            lookup_formatter: LookupFormatter::new(llm.clone(), &config.tiers),
            orchestrator: AgentOrchestrator::new(llm, registry, config),
            rewriter: QueryRewriter::new(),
            answer_filter: AnswerFilter::new(),
            sessions,
            session_ttl_secs: config.session.ttl_secs,
            answer_max_chars: config.tiers.answer_max_chars,
        }
    }

    /// Evict sessions idle longer than the configured TTL. Callers schedule
    /// this on whatever cadence suits them; returns the eviction count.
    pub fn sweep_sessions(&self) -> usize {
        self.sessions.sweep_expired(self.session_ttl_secs)
    }

    /// Answer one query end to end.
    pub async fn answer(&self, envelope: &QueryEnvelope) -> Result<String, RagError> {
        self.answer_cancellable(envelope, CancellationToken::new())
            .await
    }

    /// Like [`answer`](Self::answer), with a caller-owned cancellation token
    /// that propagates into every outstanding tool call.
    pub async fn answer_cancellable(
        &self,
        envelope: &QueryEnvelope,
        cancel: CancellationToken,
    ) -> Result<String, RagError> {
        if let Some(reply) = chitchat_reply(&envelope.query_text) {
            tracing::debug!(query = %envelope.query_text, "chitchat short-circuit");
            return Ok(reply);
        }

        let query = self
            .rewriter
            .resolve(&envelope.query_text, &envelope.conversation_history);

        let retrieval = self
            .retriever
            .retrieve(&query, envelope.session_id.as_deref())
            .await?;

        let tier = self.classifier.classify(&query, &retrieval);
        tracing::info!(
            query = %query,
            tier = ?tier,
            context_chars = retrieval.total_chars,
            "query classified"
        );

        let answer = match tier {
            Tier::SimpleList => match self.list_formatter.format_list(&retrieval) {
                Some(listing) => listing,
                // Nothing extractable: fall through to the agentic path.
                None => {
                    let context =
                        AgentContext::with_cancel(envelope.session_id.clone(), cancel);
                    self.orchestrator
                        .run_complex_query(&query, &retrieval, &context)
                        .await?
                }
            },
            Tier::BasicLookup => {
                self.lookup_formatter
                    .format_lookup(&query, &retrieval, &cancel)
                    .await?
            }
            Tier::Complex => {
                let context = AgentContext::with_cancel(envelope.session_id.clone(), cancel);
                self.orchestrator
                    .run_complex_query(&query, &retrieval, &context)
                    .await?
            }
        };

        Ok(self.post_process(answer))
    }

    /// [`answer`](Self::answer) with the orchestration-boundary fallback:
    /// request-level failures become guidance text instead of an error.
    pub async fn answer_or_fallback(&self, envelope: &QueryEnvelope) -> String {
        match self.answer(envelope).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!(query = %envelope.query_text, error = %e, "pipeline failed, emitting fallback");
                EMERGENCY_FALLBACK.to_string()
            }
        }
    }

    fn post_process(&self, answer: String) -> String {
        let filtered = self.answer_filter.filter(&answer);
        let deduped = deduplicate_gentle(&filtered);
        truncate_with_marker(deduped, self.answer_max_chars)
    }
}

/// Drops lines about family or birth details unless the line also carries a
/// professional keyword. Patterns are compiled once at engine construction.
struct AnswerFilter {
    personal: Regex,
    professional: Regex,
}

impl AnswerFilter {
    fn new() -> Self {
        Self {
            personal: Regex::new(
                r"(?i)\b(wife|husband|spouse|married|children|son|daughter|born on|birthday|date of birth)\b",
            )
            .unwrap(),
            professional: Regex::new(
                r"(?i)\b(professor|research|publication|university|department|award|degree|phd|lecturer)\b",
            )
            .unwrap(),
        }
    }

    fn filter(&self, text: &str) -> String {
        text.lines()
            .filter(|line| !self.personal.is_match(line) || self.professional.is_match(line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Greeting/thanks queries of at most three words get a canned reply with no
/// retrieval or model call.
fn chitchat_reply(query: &str) -> Option<String> {
    let normalized = query.trim().trim_end_matches(['!', '.', '?']).to_lowercase();
    if normalized.split_whitespace().count() > 3 {
        return None;
    }
    const GREETINGS: &[&str] = &[
        "hi", "hello", "hey", "good morning", "good afternoon", "good evening",
    ];
    const THANKS: &[&str] = &["thanks", "thank you", "ok thanks", "great thanks"];

    if GREETINGS.iter().any(|g| normalized == *g) {
        return Some(
            "Hello! Ask me about the department's staff, research, or your uploaded documents."
                .to_string(),
        );
    }
    if THANKS.iter().any(|t| normalized == *t) {
        return Some("You're welcome! Anything else I can look up?".to_string());
    }
    None
}

/// Collapse consecutive duplicate bullet lines; non-bullet prose passes
/// through untouched.
fn deduplicate_gentle(text: &str) -> String {
    let mut seen_bullets: Vec<String> = Vec::new();
    text.lines()
        .filter(|line| {
            let trimmed = line.trim();
            if trimmed.starts_with('-') || trimmed.starts_with('*') {
                let key = trimmed.to_lowercase();
                if seen_bullets.contains(&key) {
                    return false;
                }
                seen_bullets.push(key);
            }
            true
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate_with_marker(text: String, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text;
    }
    let cut = (0..=max_chars)
        .rev()
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(0);
    tracing::warn!(len = text.len(), max_chars, "answer truncated at safety limit");
    format!("{}\n\n[answer truncated]", &text[..cut])
}
