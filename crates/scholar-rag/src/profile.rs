//! CV synthesis.
//!
//! Builds a normalized [`ProfileRecord`] for one person by merging three
//! source layers in priority order: the caller's session uploads, the
//! internal corpus, and external scrapers. Field values from a
//! higher-priority source are never overwritten by a lower one; absent
//! fields fall through. Rendering the record into a document is an external
//! concern.

use crate::config::RagConfig;
use crate::error::RagError;
use crate::retrieval::Retriever;
use crate::scrape::{MetricsClient, RegistryClient};
use crate::types::{ProfileRecord, Publication};
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;

pub struct ProfileBuilder {
    retriever: Retriever,
    metrics: Option<Arc<MetricsClient>>,
    registry: Option<Arc<RegistryClient>>,
    max_publications: usize,
}

impl ProfileBuilder {
    pub fn new(
        retriever: Retriever,
        metrics: Option<Arc<MetricsClient>>,
        registry: Option<Arc<RegistryClient>>,
        config: &RagConfig,
    ) -> Self {
        Self {
            retriever,
            metrics,
            registry,
            max_publications: config.tiers.profile_max_publications,
        }
    }

    /// Build the profile record, or `ProfileNotFound` when no source yields
    /// a match. Scraper failures drop that source layer, they never fail the
    /// build on their own.
    pub async fn build_profile(
        &self,
        person_name: &str,
        session_id: Option<&str>,
    ) -> Result<ProfileRecord, RagError> {
        let mut record = ProfileRecord {
            name: person_name.to_string(),
            ..ProfileRecord::default()
        };
        let mut found = false;

        // Layer 1 + 2: session uploads rank before the internal corpus in
        // the retrieval result, so extracting in snippet order applies the
        // priority rule for free.
        let retrieval = self.retriever.retrieve(person_name, session_id).await?;
        for (snippet, tag) in retrieval.snippets.iter().zip(&retrieval.source_tags) {
            if !mentions(snippet, person_name) {
                continue;
            }
            found = true;
            extract_fields(&mut record, snippet);
            tracing::debug!(source = ?tag, "profile fields extracted from corpus snippet");
        }

        // Layer 3a: scholarly metrics registry.
        if let Some(metrics) = &self.metrics {
            match metrics.lookup_author(person_name).await {
                Ok(Some(scholar)) => {
                    found = true;
                    let m = scholar.metrics();
                    record.metrics.total_citations =
                        record.metrics.total_citations.or(m.total_citations);
                    record.metrics.h_index = record.metrics.h_index.or(m.h_index);
                    record.metrics.i10_index = record.metrics.i10_index.or(m.i10_index);
                    if let Some(affiliation) = scholar.affiliation.clone() {
                        push_unique(&mut record.affiliations, affiliation);
                    }
                    for interest in &scholar.interests {
                        push_unique(&mut record.research_areas, interest.clone());
                    }
                    for publication in scholar.publications() {
                        push_publication(&mut record.publications, publication);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(name = %person_name, error = %e, "metrics lookup failed, skipping layer");
                }
            }
        }

        // Layer 3b: institutional registry page.
        if let Some(registry) = &self.registry {
            match registry.fetch_person_page(person_name).await {
                Ok(page) => {
                    if mentions(&page, person_name) {
                        found = true;
                        extract_fields(&mut record, &page);
                    }
                }
                Err(e) => {
                    tracing::warn!(name = %person_name, error = %e, "registry lookup failed, skipping layer");
                }
            }
        }

        if !found {
            return Err(RagError::ProfileNotFound {
                name: person_name.to_string(),
            });
        }

        cap_publications(&mut record.publications, self.max_publications);
        tracing::info!(
            name = %person_name,
            publications = record.publications.len(),
            "profile synthesized"
        );
        Ok(record)
    }
}

fn mentions(text: &str, name: &str) -> bool {
    let bare = name
        .trim_start_matches("Prof.")
        .trim_start_matches("Professor")
        .trim_start_matches("Dr.")
        .trim_start_matches("Doctor")
        .trim();
    !bare.is_empty() && text.to_lowercase().contains(&bare.to_lowercase())
}

/// Structural extraction of profile fields from free text. First writer
/// wins per field, which together with snippet ordering enforces the source
/// priority.
fn extract_fields(record: &mut ProfileRecord, text: &str) {
    let title = Regex::new(r"(?i)\b(Professor|Associate Professor|Assistant Professor|Senior Lecturer|Lecturer)\b").unwrap();
    let education =
        Regex::new(r"(?i)\b(Ph\.?D\.?|M\.?Sc\.?|B\.?Sc\.?|M\.?Eng\.?|B\.?Eng\.?)[^.\n]{0,80}").unwrap();
    let position =
        Regex::new(r"(?i)\b(Head of [^.\n,]{3,60}|Dean of [^.\n,]{3,60}|Director of [^.\n,]{3,60})").unwrap();
    let award = Regex::new(r"(?i)[^.\n]{0,60}\b(award|medal|fellowship)\b[^.\n]{0,60}").unwrap();
    let areas = Regex::new(r"(?i)research (?:interests|areas)[:\s]+([^.\n]+)").unwrap();
    let affiliation = Regex::new(r"(?i)\b((?:Department|Faculty|School|Institute) of [^.\n,]{3,60})").unwrap();
    let link = Regex::new(r"https?://[^\s)>\]]+").unwrap();

    for m in title.find_iter(text) {
        push_unique(&mut record.titles, m.as_str().to_string());
    }
    for m in education.find_iter(text) {
        push_unique(&mut record.education, m.as_str().trim().to_string());
    }
    for m in position.find_iter(text) {
        push_unique(&mut record.positions, m.as_str().trim().to_string());
    }
    for m in award.find_iter(text) {
        push_unique(&mut record.awards, m.as_str().trim().to_string());
    }
    for caps in areas.captures_iter(text) {
        for area in caps[1].split([',', ';']) {
            let area = area.trim();
            if !area.is_empty() {
                push_unique(&mut record.research_areas, area.to_string());
            }
        }
    }
    for m in affiliation.find_iter(text) {
        push_unique(&mut record.affiliations, m.as_str().trim().to_string());
    }
    for m in link.find_iter(text) {
        push_unique(&mut record.external_links, m.as_str().to_string());
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    let key = value.to_lowercase();
    if !list.iter().any(|v| v.to_lowercase() == key) {
        list.push(value);
    }
}

fn push_publication(list: &mut Vec<Publication>, publication: Publication) {
    let key = publication.title.to_lowercase();
    if !list.iter().any(|p| p.title.to_lowercase() == key) {
        list.push(publication);
    }
}

/// Top N by recency, citations breaking ties.
fn cap_publications(publications: &mut Vec<Publication>, max: usize) {
    publications.sort_by(|a, b| {
        b.year
            .unwrap_or(0)
            .cmp(&a.year.unwrap_or(0))
            .then_with(|| b.citations.unwrap_or(0).cmp(&a.citations.unwrap_or(0)))
    });
    publications.truncate(max);

    // Titles already deduped on insert; keep the invariant explicit.
    debug_assert_eq!(
        publications.len(),
        publications
            .iter()
            .map(|p| p.title.to_lowercase())
            .collect::<HashSet<_>>()
            .len()
    );
}
