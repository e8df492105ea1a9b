//! Tier selection.
//!
//! Pure pattern-based policy: no model call, so classification is
//! instantaneous and reproducible. Ambiguous queries always fall through to
//! [`Tier::Complex`]; the classifier never errors.

use crate::config::ClassifierConfig;
use crate::types::{RetrievalResult, Tier};
use regex::Regex;

pub struct QueryClassifier {
    list_patterns: Vec<Regex>,
    lookup_patterns: Vec<Regex>,
    proper_noun: Regex,
    richness_threshold: usize,
}

impl QueryClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        let list_patterns = [
            r"(?i)\blist\s+(?:all\s+|the\s+)?\w+",
            r"(?i)\bwho\s+are\s+(?:all\s+|the\s+)?",
            r"(?i)\b(?:show|name|give)\s+(?:me\s+)?all\s+",
            r"(?i)\bhow\s+many\s+(?:professors|lecturers|doctors|staff|faculty|members)\b",
            r"(?i)\ball\s+(?:the\s+)?(?:professors|lecturers|doctors|staff|faculty|members)\b",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect();

        let lookup_patterns = [
            r"(?i)^\s*who\s+is\b",
            r"(?i)^\s*tell\s+me\s+about\b",
            r"(?i)^\s*what\s+do\s+you\s+know\s+about\b",
            r"(?i)^\s*(?:give\s+me\s+)?(?:some\s+)?(?:info|information|details)\s+(?:about|on)\b",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect();

        // Honorific, or at least one capitalized word after the first word of
        // the query (skips the sentence-initial capital).
        let proper_noun =
            Regex::new(r"(?:Prof\.?|Dr\.?|Professor|Doctor)\s+\w|\s[A-Z][a-z]+").unwrap();

        Self {
            list_patterns,
            lookup_patterns,
            proper_noun,
            richness_threshold: config.richness_threshold,
        }
    }

    /// Pure function of (query text, retrieved size). Priority: list
    /// patterns, then entity-lookup patterns split on corpus richness, then
    /// everything else is complex.
    pub fn classify(&self, query: &str, retrieval: &RetrievalResult) -> Tier {
        if self.list_patterns.iter().any(|p| p.is_match(query)) {
            return Tier::SimpleList;
        }

        let looks_like_lookup = self.lookup_patterns.iter().any(|p| p.is_match(query))
            && self.proper_noun.is_match(query);

        if looks_like_lookup {
            // Rich internal context can answer directly; a thin corpus means
            // the lookup needs external enrichment.
            return if retrieval.total_chars >= self.richness_threshold {
                Tier::BasicLookup
            } else {
                Tier::Complex
            };
        }

        Tier::Complex
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> QueryClassifier {
        QueryClassifier::new(&ClassifierConfig::default())
    }

    fn retrieval_with_chars(total_chars: usize) -> RetrievalResult {
        RetrievalResult {
            snippets: vec!["x".repeat(total_chars)],
            total_chars,
            source_tags: vec![crate::types::SourceTag::General],
        }
    }

    #[test]
    fn list_queries_route_to_simple_list() {
        let c = classifier();
        let r = retrieval_with_chars(500);
        assert_eq!(c.classify("list all lecturers", &r), Tier::SimpleList);
        assert_eq!(c.classify("Who are the professors here?", &r), Tier::SimpleList);
        assert_eq!(c.classify("how many lecturers are there", &r), Tier::SimpleList);
    }

    #[test]
    fn rich_person_lookup_routes_to_basic_lookup() {
        let c = classifier();
        let r = retrieval_with_chars(45_000);
        assert_eq!(c.classify("who is Prof. X", &r), Tier::BasicLookup);
        assert_eq!(c.classify("tell me about Dr. Maria Santos", &r), Tier::BasicLookup);
    }

    #[test]
    fn thin_person_lookup_routes_to_complex() {
        let c = classifier();
        let r = retrieval_with_chars(0);
        assert_eq!(c.classify("who is John Doe", &r), Tier::Complex);
    }

    #[test]
    fn richness_boundary_flips_the_tier() {
        let c = classifier();
        let query = "who is Professor Tan";
        assert_eq!(
            c.classify(query, &retrieval_with_chars(10_000)),
            Tier::BasicLookup
        );
        assert_eq!(
            c.classify(query, &retrieval_with_chars(9_999)),
            Tier::Complex
        );
    }

    #[test]
    fn lookup_without_proper_noun_is_complex() {
        let c = classifier();
        let r = retrieval_with_chars(45_000);
        assert_eq!(c.classify("who is the department head", &r), Tier::Complex);
    }

    #[test]
    fn everything_else_defaults_to_complex() {
        let c = classifier();
        let r = retrieval_with_chars(45_000);
        assert_eq!(
            c.classify("compare the research output of the two labs", &r),
            Tier::Complex
        );
        assert_eq!(
            c.classify("what publications did the department produce in 2024", &r),
            Tier::Complex
        );
    }

    #[test]
    fn classification_is_deterministic() {
        let c = classifier();
        let r = retrieval_with_chars(12_000);
        let first = c.classify("who is Prof. Lim", &r);
        for _ in 0..10 {
            assert_eq!(c.classify("who is Prof. Lim", &r), first);
        }
    }
}
