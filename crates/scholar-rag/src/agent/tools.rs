//! Agent tools.
//!
//! Five capability-scoped tools the orchestrator can invoke: corpus vector
//! search, session-scoped document search, a generic web scraper, a
//! scholarly-metrics lookup, and an institutional-registry lookup.

use super::context::AgentContext;
use crate::scrape::{MetricsClient, PageScraper, RegistryClient};
use crate::session::SessionStore;
use crate::store::{SearchFilter, VectorStore};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Input for a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInput {
    pub tool_id: String,
    pub parameters: serde_json::Value,
}

/// Result from tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    pub data: serde_json::Value,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            success: true,
            output: output.into(),
            data,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            output: format!("Tool failed: {}", error),
            data: json!({}),
            error: Some(error),
        }
    }
}

/// Trait every agent tool implements.
#[async_trait]
pub trait AgentTool: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    /// Parameter schema (JSON Schema format).
    fn parameters_schema(&self) -> serde_json::Value;

    async fn execute(&self, input: ToolInput, context: AgentContext) -> Result<ToolResult>;
}

/// Description of a tool for prompting.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescription {
    pub id: String,
    pub name: String,
    pub description: String,
    pub parameters_schema: serde_json::Value,
}

/// Registry of available tools.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn AgentTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn AgentTool>) {
        self.tools.insert(tool.id().to_string(), tool);
    }

    pub fn get(&self, tool_id: &str) -> Option<Arc<dyn AgentTool>> {
        self.tools.get(tool_id).cloned()
    }

    pub fn list(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn get_tool_descriptions(&self) -> Vec<ToolDescription> {
        self.tools
            .values()
            .map(|tool| ToolDescription {
                id: tool.id().to_string(),
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters_schema: tool.parameters_schema(),
            })
            .collect()
    }
}

fn query_param(input: &ToolInput) -> Result<String> {
    input.parameters["query"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("missing 'query' parameter"))
}

fn name_param(input: &ToolInput) -> Result<String> {
    input.parameters["name"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("missing 'name' parameter"))
}

// ==================== Internal tools ====================

/// Searches the general corpus. Internal, so the orchestrator is told to
/// prefer it before any external source.
pub struct VectorSearchTool {
    store: Arc<dyn VectorStore>,
    limit: usize,
}

impl VectorSearchTool {
    pub fn new(store: Arc<dyn VectorStore>, limit: usize) -> Self {
        Self { store, limit }
    }
}

#[async_trait]
impl AgentTool for VectorSearchTool {
    fn id(&self) -> &str {
        "vector_search"
    }

    fn name(&self) -> &str {
        "Corpus Search"
    }

    fn description(&self) -> &str {
        "Search the internal knowledge corpus for relevant text. Use this FIRST, before any external source."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search query"}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: ToolInput, _context: AgentContext) -> Result<ToolResult> {
        let query = query_param(&input)?;
        let hits = self.store.search(&query, None, self.limit).await?;
        if hits.is_empty() {
            return Ok(ToolResult::ok("No matching corpus entries.", json!({"hits": 0})));
        }
        let joined = hits
            .iter()
            .map(|h| h.text.as_str())
            .collect::<Vec<_>>()
            .join("\n---\n");
        Ok(ToolResult::ok(joined, json!({"hits": hits.len()})))
    }
}

/// Searches only the caller's own uploaded documents. The session id comes
/// from the request context, never from model-supplied parameters, so one
/// session can never read another session's uploads.
pub struct DocumentSearchTool {
    store: Arc<dyn VectorStore>,
    sessions: SessionStore,
    limit: usize,
}

impl DocumentSearchTool {
    pub fn new(store: Arc<dyn VectorStore>, sessions: SessionStore, limit: usize) -> Self {
        Self {
            store,
            sessions,
            limit,
        }
    }
}

#[async_trait]
impl AgentTool for DocumentSearchTool {
    fn id(&self) -> &str {
        "document_search"
    }

    fn name(&self) -> &str {
        "Uploaded Document Search"
    }

    fn description(&self) -> &str {
        "Search the documents and URLs the user uploaded in this conversation."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search query"}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: ToolInput, context: AgentContext) -> Result<ToolResult> {
        let query = query_param(&input)?;

        let Some(session) = context.session_id.as_deref() else {
            return Ok(ToolResult::ok(
                "No session: no uploaded documents to search.",
                json!({"hits": 0}),
            ));
        };
        if !self.sessions.get_session_context(session).has_uploads() {
            return Ok(ToolResult::ok(
                "This session has no uploaded documents.",
                json!({"hits": 0}),
            ));
        }

        let filter = SearchFilter::for_session(session);
        let hits = self.store.search(&query, Some(&filter), self.limit).await?;
        if hits.is_empty() {
            return Ok(ToolResult::ok(
                "No matches in the uploaded documents.",
                json!({"hits": 0}),
            ));
        }
        let joined = hits
            .iter()
            .map(|h| h.text.as_str())
            .collect::<Vec<_>>()
            .join("\n---\n");
        Ok(ToolResult::ok(joined, json!({"hits": hits.len()})))
    }
}

// ==================== External tools ====================

/// Fetches an arbitrary web page as readable text.
pub struct WebScrapeTool {
    scraper: Arc<PageScraper>,
}

impl WebScrapeTool {
    pub fn new(scraper: Arc<PageScraper>) -> Self {
        Self { scraper }
    }
}

#[async_trait]
impl AgentTool for WebScrapeTool {
    fn id(&self) -> &str {
        "web_scrape"
    }

    fn name(&self) -> &str {
        "Web Page Fetch"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its readable text. Use only when internal sources are insufficient."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "Page URL to fetch"}
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, input: ToolInput, _context: AgentContext) -> Result<ToolResult> {
        let url = input.parameters["url"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("missing 'url' parameter"))?;
        match self.scraper.fetch_text(url).await {
            Ok(text) => Ok(ToolResult::ok(text, json!({"url": url}))),
            Err(e) => Ok(ToolResult::failed(e.to_string())),
        }
    }
}

/// Looks up citation metrics and publications for an author.
pub struct MetricsScrapeTool {
    client: Arc<MetricsClient>,
}

impl MetricsScrapeTool {
    pub fn new(client: Arc<MetricsClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentTool for MetricsScrapeTool {
    fn id(&self) -> &str {
        "metrics_lookup"
    }

    fn name(&self) -> &str {
        "Scholarly Metrics Lookup"
    }

    fn description(&self) -> &str {
        "Look up an author's citation metrics and publications in the scholarly registry."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "description": "Author name"}
            },
            "required": ["name"]
        })
    }

    async fn execute(&self, input: ToolInput, _context: AgentContext) -> Result<ToolResult> {
        let name = name_param(&input)?;
        match self.client.lookup_author(&name).await {
            Ok(Some(record)) => {
                let data = serde_json::to_value(&record.metrics()).unwrap_or(json!({}));
                let mut output = format!("Author: {}\n", record.name);
                if let Some(affiliation) = &record.affiliation {
                    output.push_str(&format!("Affiliation: {}\n", affiliation));
                }
                if let Some(cited) = record.cited_by {
                    output.push_str(&format!("Total citations: {}\n", cited));
                }
                if let Some(h) = record.h_index {
                    output.push_str(&format!("h-index: {}\n", h));
                }
                for publication in record.publications().iter().take(10) {
                    output.push_str(&format!(
                        "- {} ({})\n",
                        publication.title,
                        publication
                            .year
                            .map(|y| y.to_string())
                            .unwrap_or_else(|| "n.d.".to_string())
                    ));
                }
                Ok(ToolResult::ok(output, data))
            }
            Ok(None) => Ok(ToolResult::ok(
                format!("No scholarly record found for '{}'.", name),
                json!({"found": false}),
            )),
            Err(e) => Ok(ToolResult::failed(e.to_string())),
        }
    }
}

/// Fetches a person's page from the institutional staff registry.
pub struct RegistryScrapeTool {
    client: Arc<RegistryClient>,
}

impl RegistryScrapeTool {
    pub fn new(client: Arc<RegistryClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentTool for RegistryScrapeTool {
    fn id(&self) -> &str {
        "registry_lookup"
    }

    fn name(&self) -> &str {
        "Staff Registry Lookup"
    }

    fn description(&self) -> &str {
        "Fetch a person's page from the institutional staff registry (title, department, contact)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "description": "Person's full name"}
            },
            "required": ["name"]
        })
    }

    async fn execute(&self, input: ToolInput, _context: AgentContext) -> Result<ToolResult> {
        let name = name_param(&input)?;
        match self.client.fetch_person_page(&name).await {
            Ok(text) => Ok(ToolResult::ok(text, json!({"name": name}))),
            Err(e) => Ok(ToolResult::failed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ChunkMetadata, MemoryVectorStore};
    use crate::types::SourceKind;

    fn meta(session: Option<&str>) -> ChunkMetadata {
        ChunkMetadata {
            session_id: session.map(|s| s.to_string()),
            source_name: "t.pdf".to_string(),
            source_kind: SourceKind::Document,
            sequence_index: 0,
        }
    }

    #[tokio::test]
    async fn document_search_is_scoped_to_the_callers_session() {
        let store = Arc::new(MemoryVectorStore::new());
        store.upsert("s1_a_0", "antenna design notes", meta(Some("s1"))).await.unwrap();
        store.upsert("s2_b_0", "antenna design secrets", meta(Some("s2"))).await.unwrap();

        let sessions = SessionStore::new();
        sessions.set_session_document("s1", "s1_a_0");
        sessions.set_session_document("s2", "s2_b_0");

        let tool = DocumentSearchTool::new(store, sessions, 10);
        let input = ToolInput {
            tool_id: "document_search".to_string(),
            parameters: json!({"query": "antenna"}),
        };
        let result = tool
            .execute(input, AgentContext::new(Some("s1".to_string())))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.output.contains("notes"));
        assert!(!result.output.contains("secrets"));
    }

    #[tokio::test]
    async fn document_search_without_session_returns_empty() {
        let store = Arc::new(MemoryVectorStore::new());
        let tool = DocumentSearchTool::new(store, SessionStore::new(), 10);
        let input = ToolInput {
            tool_id: "document_search".to_string(),
            parameters: json!({"query": "anything"}),
        };
        let result = tool.execute(input, AgentContext::new(None)).await.unwrap();
        assert!(result.success);
        assert_eq!(result.data["hits"], 0);
    }

    #[tokio::test]
    async fn vector_search_reports_missing_query_parameter() {
        let store = Arc::new(MemoryVectorStore::new());
        let tool = VectorSearchTool::new(store, 10);
        let input = ToolInput {
            tool_id: "vector_search".to_string(),
            parameters: json!({}),
        };
        assert!(tool.execute(input, AgentContext::new(None)).await.is_err());
    }

    #[test]
    fn registry_exposes_descriptions_for_every_tool() {
        let store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::new());
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(VectorSearchTool::new(store.clone(), 10)));
        registry.register(Arc::new(DocumentSearchTool::new(
            store,
            SessionStore::new(),
            10,
        )));

        let descriptions = registry.get_tool_descriptions();
        assert_eq!(descriptions.len(), 2);
        assert!(registry.get("vector_search").is_some());
        assert!(registry.get("nonexistent").is_none());
    }
}
