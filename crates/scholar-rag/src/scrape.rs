//! External source scrapers.
//!
//! Three capability-scoped clients used by the agentic tier and CV
//! synthesis: a generic page scraper, a scholarly-metrics API client, and an
//! institutional-registry client. All calls carry the network timeout from
//! config; failures are returned to the caller, who treats them as one
//! source going dark rather than a request-level error.

use anyhow::{anyhow, Result};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::types::{Publication, ProfileMetrics};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; scholar-rag/0.1)";

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| anyhow!("failed to build scrape client: {}", e))
}

/// Fetches an arbitrary page and reduces it to readable text.
pub struct PageScraper {
    client: Client,
    max_chars: usize,
}

impl PageScraper {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            max_chars: 20_000,
        })
    }

    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                anyhow!("page fetch from {} timed out", url)
            } else {
                anyhow!("page fetch from {} failed: {}", url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("{} returned HTTP {}", url, status));
        }

        let html = response
            .text()
            .await
            .map_err(|e| anyhow!("failed to read body from {}: {}", url, e))?;

        let text = strip_html(&html);
        if text.trim().is_empty() {
            return Err(anyhow!("{} yielded no readable text", url));
        }

        let mut text = text;
        if text.len() > self.max_chars {
            let cut = (0..=self.max_chars)
                .rev()
                .find(|&i| text.is_char_boundary(i))
                .unwrap_or(0);
            text.truncate(cut);
        }
        tracing::debug!(url = %url, chars = text.len(), "page scraped");
        Ok(text)
    }
}

/// Drop scripts, styles, and tags; collapse whitespace.
fn strip_html(html: &str) -> String {
    let script = Regex::new(r"(?is)<script\b.*?</script>").unwrap();
    let style = Regex::new(r"(?is)<style\b.*?</style>").unwrap();
    let tag = Regex::new(r"(?s)<[^>]+>").unwrap();
    let ws = Regex::new(r"\s+").unwrap();

    let text = script.replace_all(html, " ");
    let text = style.replace_all(&text, " ");
    let text = tag.replace_all(&text, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&#39;", "'")
        .replace("&quot;", "\"");
    ws.replace_all(&text, " ").trim().to_string()
}

/// Citation metrics and publications from a scholarly-metrics JSON API.
pub struct MetricsClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScholarRecord {
    pub name: String,
    #[serde(default)]
    pub affiliation: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub cited_by: Option<u32>,
    #[serde(default)]
    pub h_index: Option<u32>,
    #[serde(default)]
    pub i10_index: Option<u32>,
    #[serde(default)]
    pub publications: Vec<ScholarPublication>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScholarPublication {
    pub title: String,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub year: Option<u16>,
    #[serde(default)]
    pub citations: Option<u32>,
}

impl ScholarRecord {
    pub fn metrics(&self) -> ProfileMetrics {
        ProfileMetrics {
            total_citations: self.cited_by,
            h_index: self.h_index,
            i10_index: self.i10_index,
        }
    }

    pub fn publications(&self) -> Vec<Publication> {
        self.publications
            .iter()
            .map(|p| Publication {
                title: p.title.clone(),
                venue: p.venue.clone(),
                year: p.year,
                citations: p.citations,
            })
            .collect()
    }
}

impl MetricsClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn lookup_author(&self, name: &str) -> Result<Option<ScholarRecord>> {
        let endpoint = format!("{}/authors", self.base_url);
        let response = self
            .client
            .get(&endpoint)
            .query(&[("q", name)])
            .send()
            .await
            .map_err(|e| anyhow!("metrics lookup for '{}' failed: {}", name, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(anyhow!("metrics API returned HTTP {}", status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| anyhow!("failed to read metrics response: {}", e))?;
        if body.trim_start().starts_with('<') {
            return Err(anyhow!("metrics API returned HTML instead of JSON"));
        }

        #[derive(Deserialize)]
        struct AuthorsResponse {
            authors: Vec<ScholarRecord>,
        }
        let parsed: AuthorsResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow!("bad metrics response: {}", e))?;

        Ok(parsed.authors.into_iter().next())
    }
}

/// Staff pages from the institutional registry.
pub struct RegistryClient {
    scraper: PageScraper,
    base_url: String,
}

impl RegistryClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            scraper: PageScraper::new(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the registry page for a person. Name goes into the path slug
    /// the way the registry expects it.
    pub async fn fetch_person_page(&self, name: &str) -> Result<String> {
        let slug = slugify(name);
        let url = format!("{}/staff/{}", self.base_url, slug);
        self.scraper.fetch_text(&url).await
    }
}

fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_html_removes_scripts_and_tags() {
        let html = r#"<html><head><style>body{color:red}</style>
            <script>alert("x")</script></head>
            <body><h1>Dr. Chen</h1><p>Photonics &amp; optics lab.</p></body></html>"#;
        let text = strip_html(html);
        assert!(text.contains("Dr. Chen"));
        assert!(text.contains("Photonics & optics lab."));
        assert!(!text.contains("alert"));
        assert!(!text.contains("color:red"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn slugify_normalizes_names() {
        assert_eq!(slugify("Prof. Aminah Rahman"), "prof-aminah-rahman");
        assert_eq!(slugify("  Wei   Chen "), "wei-chen");
    }

    #[test]
    fn scholar_record_maps_to_profile_fields() {
        let record: ScholarRecord = serde_json::from_str(
            r#"{
                "name": "Wei Chen",
                "cited_by": 1200,
                "h_index": 18,
                "publications": [
                    {"title": "A survey", "year": 2022, "citations": 40}
                ]
            }"#,
        )
        .unwrap();
        let metrics = record.metrics();
        assert_eq!(metrics.total_citations, Some(1200));
        assert_eq!(metrics.h_index, Some(18));
        assert_eq!(metrics.i10_index, None);
        assert_eq!(record.publications().len(), 1);
    }
}
