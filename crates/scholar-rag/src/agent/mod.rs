//! Agentic orchestration for complex queries.

pub mod context;
pub mod tool_loop;
pub mod tools;

pub use context::AgentContext;
pub use tool_loop::{run_tool_loop, scrub_final_answer, ToolLoopConfig, ToolLoopResult};
pub use tools::{AgentTool, ToolInput, ToolRegistry, ToolResult};

use crate::config::RagConfig;
use crate::error::RagError;
use crate::llm::{ChatMessage, LlmProvider, ToolSchema};
use crate::types::RetrievalResult;
use std::sync::Arc;

const ORCHESTRATOR_SYSTEM_PROMPT: &str = "\
You are a research assistant for an academic department. Answer the user's \
question by calling the available tools and synthesizing what they return.

Rules:
1. Prefer internal tools (vector_search, document_search) before any \
external one; external tools are slower and rate-limited.
2. When sources conflict, trust them in this order: internal corpus, \
scholarly metrics registry, staff registry, generic web pages.
3. When you have enough information, stop calling tools and write ONE \
clear natural-language answer. Never include tool names, JSON, or your \
reasoning steps in the answer.
4. If a tool fails, work with what the other tools returned.";

/// Coordinates the capability-scoped tools for open-ended queries.
pub struct AgentOrchestrator {
    llm: Arc<dyn LlmProvider>,
    registry: ToolRegistry,
    loop_config: ToolLoopConfig,
}

impl AgentOrchestrator {
    pub fn new(llm: Arc<dyn LlmProvider>, registry: ToolRegistry, config: &RagConfig) -> Self {
        Self {
            llm,
            registry,
            loop_config: ToolLoopConfig {
                max_iterations: config.tiers.agent_max_iterations,
                tool_timeout_secs: config.network.tool_timeout_secs,
                max_tokens: config.tiers.agent_max_tokens,
            },
        }
    }

    /// Run the tool loop for one complex query. Retrieval output seeds the
    /// conversation so the model starts from whatever the corpus already
    /// knows. Only a failed final synthesis surfaces as an error.
    pub async fn run_complex_query(
        &self,
        query: &str,
        retrieval: &RetrievalResult,
        context: &AgentContext,
    ) -> Result<String, RagError> {
        let mut messages = vec![ChatMessage::system(ORCHESTRATOR_SYSTEM_PROMPT)];

        if !retrieval.is_empty() {
            messages.push(ChatMessage::user(format!(
                "Context already retrieved from the internal corpus:\n{}",
                retrieval.joined()
            )));
        }
        messages.push(ChatMessage::user(query.to_string()));

        let schemas = self.tool_schemas();
        let result = run_tool_loop(
            self.llm.as_ref(),
            &self.registry,
            &mut messages,
            &schemas,
            context,
            &self.loop_config,
        )
        .await?;

        tracing::info!(
            query = %query,
            iterations = result.iterations,
            tool_calls = result.tool_invocations.len(),
            "complex query answered"
        );

        if result.content.trim().is_empty() {
            return Err(RagError::LlmEmptyResponse);
        }
        Ok(result.content)
    }

    fn tool_schemas(&self) -> Vec<ToolSchema> {
        self.registry
            .get_tool_descriptions()
            .iter()
            .map(|d| ToolSchema {
                name: d.id.clone(),
                description: d.description.clone(),
                parameters: d.parameters_schema.clone(),
            })
            .collect()
    }
}
