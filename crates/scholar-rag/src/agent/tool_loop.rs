//! Tool-calling loop.
//!
//! Sends messages plus tool schemas to the model, executes requested tool
//! calls, feeds results back, and loops until the model produces a final
//! text answer. The loop owns the stop condition: a hard iteration cap with
//! forced synthesis, per-tool timeouts that degrade to local failures, and a
//! cancellation check before every round-trip.

use anyhow::{anyhow, Result};
use std::time::Duration;

use super::context::AgentContext;
use super::tools::{ToolInput, ToolRegistry, ToolResult};
use crate::error::RagError;
use crate::llm::{ChatMessage, ChatResponse, GenerationConfig, LlmProvider, ToolCall, ToolSchema};

#[derive(Debug, Clone)]
pub struct ToolLoopConfig {
    /// Maximum number of model round-trips before synthesis is forced.
    pub max_iterations: usize,
    /// Per-tool execution timeout in seconds.
    pub tool_timeout_secs: u64,
    pub max_tokens: usize,
}

impl Default for ToolLoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            tool_timeout_secs: 30,
            max_tokens: 2048,
        }
    }
}

/// A single tool invocation record for observability.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub result: String,
    pub success: bool,
    pub duration_ms: u64,
}

/// The final output of a loop run.
#[derive(Debug, Clone)]
pub struct ToolLoopResult {
    pub content: String,
    pub tool_invocations: Vec<ToolInvocation>,
    pub iterations: usize,
}

/// Run the tool-calling loop.
///
/// 1. Send `messages` + `tool_schemas` to the model via `chat()`.
/// 2. `ToolCalls` → execute each tool → append results → loop.
/// 3. `Content` → scrub and return.
pub async fn run_tool_loop(
    llm: &dyn LlmProvider,
    tool_registry: &ToolRegistry,
    messages: &mut Vec<ChatMessage>,
    tool_schemas: &[ToolSchema],
    agent_context: &AgentContext,
    config: &ToolLoopConfig,
) -> Result<ToolLoopResult> {
    let generation = GenerationConfig {
        max_tokens: config.max_tokens,
        ..GenerationConfig::default()
    };

    let mut invocations = Vec::new();
    let mut iterations = 0;

    loop {
        if agent_context.cancel.is_cancelled() {
            return Err(anyhow!("request cancelled"));
        }

        iterations += 1;
        if iterations > config.max_iterations {
            tracing::warn!(
                max = config.max_iterations,
                "tool loop hit max iterations, forcing synthesis"
            );
            messages.push(ChatMessage::user(
                "Stop using tools. Synthesize a final answer now from the tool results above.",
            ));
            // No tools offered, so the model cannot stall another round.
            let response = chat_cancellable(llm, messages, &[], &generation, agent_context).await?;
            let content = match response {
                ChatResponse::Content(text) => text,
                ChatResponse::ToolCalls(_) => {
                    "I could not complete the task within the allowed number of tool calls."
                        .to_string()
                }
            };
            return Ok(ToolLoopResult {
                content: scrub_final_answer(&content),
                tool_invocations: invocations,
                iterations,
            });
        }

        tracing::debug!(iteration = iterations, "tool loop: sending to model");
        let response =
            chat_cancellable(llm, messages, tool_schemas, &generation, agent_context).await?;

        match response {
            ChatResponse::Content(text) => {
                tracing::debug!(iteration = iterations, "tool loop: model returned content");
                return Ok(ToolLoopResult {
                    content: scrub_final_answer(&text),
                    tool_invocations: invocations,
                    iterations,
                });
            }
            ChatResponse::ToolCalls(tool_calls) => {
                tracing::info!(
                    iteration = iterations,
                    count = tool_calls.len(),
                    tools = ?tool_calls.iter().map(|tc| &tc.name).collect::<Vec<_>>(),
                    "tool loop: model requested tool calls"
                );

                messages.push(ChatMessage::assistant_tool_calls(tool_calls.clone()));

                for tc in &tool_calls {
                    if agent_context.cancel.is_cancelled() {
                        return Err(anyhow!("request cancelled"));
                    }

                    let start = std::time::Instant::now();
                    let result = execute_tool_call(
                        tool_registry,
                        tc,
                        agent_context,
                        config.tool_timeout_secs,
                    )
                    .await;
                    let duration_ms = start.elapsed().as_millis() as u64;

                    let (output, success) = match result {
                        Ok(tool_result) => (tool_result.output, tool_result.success),
                        Err(e) => (format!("Tool execution error: {}", e), false),
                    };

                    if !success {
                        tracing::warn!(tool = %tc.name, output = %output, "tool failed, continuing");
                    }

                    invocations.push(ToolInvocation {
                        tool_name: tc.name.clone(),
                        arguments: serde_json::from_str(&tc.arguments)
                            .unwrap_or(serde_json::json!({})),
                        result: output.clone(),
                        success,
                        duration_ms,
                    });

                    messages.push(ChatMessage::tool_result(&tc.id, &tc.name, &output));
                }
            }
        }
    }
}

/// A model round-trip raced against cancellation, so an in-flight request is
/// dropped the moment the token fires instead of running to completion.
async fn chat_cancellable(
    llm: &dyn LlmProvider,
    messages: &[ChatMessage],
    tool_schemas: &[ToolSchema],
    generation: &GenerationConfig,
    agent_context: &AgentContext,
) -> Result<ChatResponse> {
    tokio::select! {
        response = llm.chat(messages, tool_schemas, generation) => response,
        _ = agent_context.cancel.cancelled() => Err(anyhow!("request cancelled during model call")),
    }
}

/// Execute a single tool call against the registry. A timeout or a failed
/// tool becomes a failed result fed back to the model, never a loop abort.
async fn execute_tool_call(
    registry: &ToolRegistry,
    tool_call: &ToolCall,
    agent_context: &AgentContext,
    timeout_secs: u64,
) -> Result<ToolResult> {
    let Some(tool) = registry.get(&tool_call.name) else {
        return Ok(ToolResult::failed(format!(
            "unknown tool: {}",
            tool_call.name
        )));
    };

    let parameters: serde_json::Value =
        serde_json::from_str(&tool_call.arguments).unwrap_or(serde_json::json!({}));
    let input = ToolInput {
        tool_id: tool_call.name.clone(),
        parameters,
    };

    let future = tool.execute(input, agent_context.clone());
    tokio::select! {
        result = tokio::time::timeout(Duration::from_secs(timeout_secs), future) => {
            match result {
                Ok(result) => result,
                Err(_) => {
                    let err = RagError::ToolTimeout {
                        tool: tool_call.name.clone(),
                        secs: timeout_secs,
                    };
                    tracing::warn!(tool = %tool_call.name, timeout_secs, "tool timed out");
                    Ok(ToolResult::failed(err.to_string()))
                }
            }
        }
        _ = agent_context.cancel.cancelled() => {
            Err(anyhow!("request cancelled during tool '{}'", tool_call.name))
        }
    }
}

/// Remove reasoning scaffolding and raw tool-invocation descriptors from a
/// final answer. A leaked `"action"`/`"tool_name"` fragment means the model
/// emitted loop-internal text; it must never reach the caller.
pub fn scrub_final_answer(text: &str) -> String {
    let mut answer = text.trim().to_string();

    // Keep only the text after an explicit final-answer marker.
    for marker in ["Final Answer:", "FINAL ANSWER:", "final answer:"] {
        if let Some(pos) = answer.find(marker) {
            answer = answer[pos + marker.len()..].trim().to_string();
        }
    }

    let cleaned: Vec<&str> = answer
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            let lowered = trimmed.to_lowercase();
            !(lowered.starts_with("thought:")
                || lowered.starts_with("action:")
                || lowered.starts_with("action input:")
                || lowered.starts_with("observation:")
                || trimmed.contains("\"action\"")
                || trimmed.contains("\"tool_name\"")
                || trimmed.contains("\"tool_calls\""))
        })
        .collect();

    cleaned.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::scripted::ScriptedProvider;
    use crate::llm::ToolCall;
    use crate::store::MemoryVectorStore;
    use std::sync::Arc;

    fn registry_with_search() -> ToolRegistry {
        let store = Arc::new(MemoryVectorStore::new());
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(super::super::tools::VectorSearchTool::new(
            store, 10,
        )));
        registry
    }

    fn schemas(registry: &ToolRegistry) -> Vec<ToolSchema> {
        registry
            .get_tool_descriptions()
            .iter()
            .map(|d| ToolSchema {
                name: d.id.clone(),
                description: d.description.clone(),
                parameters: d.parameters_schema.clone(),
            })
            .collect()
    }

    #[tokio::test]
    async fn content_response_ends_the_loop() {
        let llm = ScriptedProvider::new().respond_with("The lab was founded in 2004.");
        let registry = registry_with_search();
        let mut messages = vec![ChatMessage::user("when was the lab founded")];

        let result = run_tool_loop(
            &llm,
            &registry,
            &mut messages,
            &schemas(&registry),
            &AgentContext::new(None),
            &ToolLoopConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(result.iterations, 1);
        assert!(result.tool_invocations.is_empty());
        assert_eq!(result.content, "The lab was founded in 2004.");
    }

    #[tokio::test]
    async fn tool_calls_execute_and_feed_back() {
        let llm = ScriptedProvider::new()
            .then(ChatResponse::ToolCalls(vec![ToolCall {
                id: "call_1".to_string(),
                name: "vector_search".to_string(),
                arguments: r#"{"query": "founding year"}"#.to_string(),
            }]))
            .respond_with("Answer built from the corpus result.");
        let registry = registry_with_search();
        let mut messages = vec![ChatMessage::user("when was the lab founded")];

        let result = run_tool_loop(
            &llm,
            &registry,
            &mut messages,
            &schemas(&registry),
            &AgentContext::new(None),
            &ToolLoopConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(result.iterations, 2);
        assert_eq!(result.tool_invocations.len(), 1);
        assert_eq!(result.tool_invocations[0].tool_name, "vector_search");
    }

    #[tokio::test]
    async fn iteration_cap_forces_synthesis() {
        let call = || {
            ChatResponse::ToolCalls(vec![ToolCall {
                id: "c".to_string(),
                name: "vector_search".to_string(),
                arguments: r#"{"query": "x"}"#.to_string(),
            }])
        };
        let llm = ScriptedProvider::new()
            .then(call())
            .then(call())
            .then(call())
            .respond_with("Forced final synthesis.");
        let registry = registry_with_search();
        let mut messages = vec![ChatMessage::user("q")];

        let config = ToolLoopConfig {
            max_iterations: 3,
            ..Default::default()
        };
        let result = run_tool_loop(
            &llm,
            &registry,
            &mut messages,
            &schemas(&registry),
            &AgentContext::new(None),
            &config,
        )
        .await
        .unwrap();

        assert_eq!(result.content, "Forced final synthesis.");
        assert_eq!(result.tool_invocations.len(), 3);
    }

    #[tokio::test]
    async fn unknown_tool_degrades_to_failed_result() {
        let llm = ScriptedProvider::new()
            .then(ChatResponse::ToolCalls(vec![ToolCall {
                id: "c".to_string(),
                name: "no_such_tool".to_string(),
                arguments: "{}".to_string(),
            }]))
            .respond_with("done");
        let registry = registry_with_search();
        let mut messages = vec![ChatMessage::user("q")];

        let result = run_tool_loop(
            &llm,
            &registry,
            &mut messages,
            &schemas(&registry),
            &AgentContext::new(None),
            &ToolLoopConfig::default(),
        )
        .await
        .unwrap();

        assert!(!result.tool_invocations[0].success);
        assert_eq!(result.content, "done");
    }

    #[tokio::test]
    async fn cancellation_aborts_the_loop() {
        let llm = ScriptedProvider::new().respond_with("never reached");
        let registry = registry_with_search();
        let mut messages = vec![ChatMessage::user("q")];

        let context = AgentContext::new(None);
        context.cancel.cancel();

        let err = run_tool_loop(
            &llm,
            &registry,
            &mut messages,
            &schemas(&registry),
            &context,
            &ToolLoopConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }

    #[tokio::test]
    async fn cancellation_interrupts_an_in_flight_model_call() {
        let llm = ScriptedProvider::new()
            .with_delay(Duration::from_millis(500))
            .respond_with("never reached");
        let registry = registry_with_search();
        let mut messages = vec![ChatMessage::user("q")];

        let context = AgentContext::new(None);
        let cancel = context.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let start = std::time::Instant::now();
        let err = run_tool_loop(
            &llm,
            &registry,
            &mut messages,
            &schemas(&registry),
            &context,
            &ToolLoopConfig::default(),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("cancelled"));
        // The slow model call was abandoned, not awaited to completion.
        assert!(start.elapsed() < Duration::from_millis(400));
    }

    /// Tool double that never finishes inside any sensible timeout.
    struct StallingTool;

    #[async_trait::async_trait]
    impl super::super::tools::AgentTool for StallingTool {
        fn id(&self) -> &str {
            "stalling_tool"
        }

        fn name(&self) -> &str {
            "Stalling Tool"
        }

        fn description(&self) -> &str {
            "hangs forever"
        }

        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }

        async fn execute(
            &self,
            _input: ToolInput,
            _context: AgentContext,
        ) -> Result<ToolResult> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ToolResult::ok("unreachable", serde_json::json!({})))
        }
    }

    #[tokio::test]
    async fn tool_timeout_degrades_to_failed_result() {
        let llm = ScriptedProvider::new()
            .then(ChatResponse::ToolCalls(vec![ToolCall {
                id: "c".to_string(),
                name: "stalling_tool".to_string(),
                arguments: "{}".to_string(),
            }]))
            .respond_with("answered without the stalled tool");
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(StallingTool));
        let mut messages = vec![ChatMessage::user("q")];

        let config = ToolLoopConfig {
            tool_timeout_secs: 0,
            ..Default::default()
        };
        let result = run_tool_loop(
            &llm,
            &registry,
            &mut messages,
            &schemas(&registry),
            &AgentContext::new(None),
            &config,
        )
        .await
        .unwrap();

        assert!(!result.tool_invocations[0].success);
        assert!(result.tool_invocations[0].result.contains("timed out"));
        assert_eq!(result.content, "answered without the stalled tool");
    }

    #[test]
    fn scrub_strips_reasoning_scaffolding() {
        let raw = "Thought: I should search.\nAction: vector_search\nObservation: found it\nFinal Answer: Prof. X leads the lab.";
        assert_eq!(scrub_final_answer(raw), "Prof. X leads the lab.");
    }

    #[test]
    fn scrub_removes_leaked_tool_descriptors() {
        let raw = "Here is the answer.\n{\"action\": \"vector_search\", \"tool_name\": \"x\"}\nProf. X leads the lab.";
        let scrubbed = scrub_final_answer(raw);
        assert!(!scrubbed.contains("\"action\""));
        assert!(!scrubbed.contains("\"tool_name\""));
        assert!(scrubbed.contains("Prof. X leads the lab."));
    }

    #[test]
    fn scrub_keeps_plain_answers_intact() {
        let raw = "Prof. X has 1200 citations and an h-index of 18.";
        assert_eq!(scrub_final_answer(raw), raw);
    }
}
