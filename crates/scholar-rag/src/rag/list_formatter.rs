//! Direct list formatter.
//!
//! Answers "list all X" queries by structural extraction from the retrieved
//! snippets alone. No model call, so identical input yields byte-identical
//! output on every run.

use crate::types::RetrievalResult;
use regex::Regex;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Seniority {
    Professor,
    Doctor,
    Other,
}

impl Seniority {
    fn from_honorific(honorific: &str) -> Self {
        let h = honorific.to_lowercase();
        if h.starts_with("prof") {
            Seniority::Professor
        } else if h.starts_with("dr") || h.starts_with("doctor") {
            Seniority::Doctor
        } else {
            Seniority::Other
        }
    }

    fn heading(self) -> &'static str {
        match self {
            Seniority::Professor => "Professors",
            Seniority::Doctor => "Doctors",
            Seniority::Other => "Other Staff",
        }
    }

    fn display_honorific(self) -> &'static str {
        match self {
            Seniority::Professor => "Prof.",
            Seniority::Doctor => "Dr.",
            Seniority::Other => "",
        }
    }
}

#[derive(Debug, Clone)]
struct Entity {
    name: String,
    seniority: Seniority,
}

pub struct ListFormatter {
    honorific_name: Regex,
}

impl Default for ListFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ListFormatter {
    pub fn new() -> Self {
        // Honorific (any case; OCR and scraped pages are inconsistent)
        // followed by a name. The first name token may be any case,
        // continuation tokens must be capitalized so trailing prose is not
        // swallowed.
        let honorific_name = Regex::new(
            r"\b((?i:prof(?:essor)?\.?|dr\.?|doctor|ir\.?|ts\.?))\s+([A-Za-z][\w.'-]*(?:\s+[A-Z][\w.'-]*)*)",
        )
        .unwrap();
        Self { honorific_name }
    }

    /// Extract, deduplicate, group by seniority, and render with a total
    /// count. Returns `None` when no entity could be extracted so the caller
    /// can fall through to a model-backed tier.
    pub fn format_list(&self, retrieval: &RetrievalResult) -> Option<String> {
        let entities = self.extract(retrieval);
        if entities.is_empty() {
            return None;
        }

        let mut grouped: Vec<(Seniority, Vec<&Entity>)> = Vec::new();
        for tier in [Seniority::Professor, Seniority::Doctor, Seniority::Other] {
            let mut members: Vec<&Entity> =
                entities.iter().filter(|e| e.seniority == tier).collect();
            members.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
            if !members.is_empty() {
                grouped.push((tier, members));
            }
        }

        let total: usize = grouped.iter().map(|(_, m)| m.len()).sum();
        let mut out = String::new();
        for (tier, members) in &grouped {
            out.push_str(&format!("{} ({}):\n", tier.heading(), members.len()));
            for entity in members {
                let honorific = tier.display_honorific();
                if honorific.is_empty() {
                    out.push_str(&format!("- {}\n", entity.name));
                } else {
                    out.push_str(&format!("- {} {}\n", honorific, entity.name));
                }
            }
            out.push('\n');
        }
        out.push_str(&format!("Total: {}", total));

        tracing::debug!(entities = total, "direct list formatted");
        Some(out)
    }

    fn extract(&self, retrieval: &RetrievalResult) -> Vec<Entity> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut entities = Vec::new();

        for snippet in &retrieval.snippets {
            for caps in self.honorific_name.captures_iter(snippet) {
                let seniority = Seniority::from_honorific(&caps[1]);
                let name = title_case(caps[2].trim_end_matches(['.', ',']));
                if name.is_empty() {
                    continue;
                }
                // Case-insensitive dedup across honorific variants of the
                // same person.
                if seen.insert(name.to_lowercase()) {
                    entities.push(Entity { name, seniority });
                }
            }
        }

        entities
    }
}

fn title_case(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
