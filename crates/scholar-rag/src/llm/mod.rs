//! Language model access.
//!
//! The engine only ever talks to a model through [`LlmProvider`]: plain
//! completions for the lookup tier and chat-with-tools for the agentic tier.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub mod external;

#[cfg(test)]
pub mod scripted;

pub use external::{ApiProvider, ExternalProvider};

/// Per-call generation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub stop_sequences: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.7,
            top_p: 0.95,
            stop_sequences: Vec::new(),
        }
    }
}

impl GenerationConfig {
    /// Deterministic settings for fact extraction.
    pub fn deterministic(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            temperature: 0.0,
            top_p: 1.0,
            stop_sequences: Vec::new(),
        }
    }
}

/// Core trait every model backend implements.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Single-shot completion.
    async fn complete(&self, prompt: &str, config: &GenerationConfig) -> Result<String>;

    /// Chat completion with full message history and optional tool schemas.
    /// Default implementation flattens the history into one prompt and
    /// ignores the tools.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
        config: &GenerationConfig,
    ) -> Result<ChatResponse> {
        let _ = tools;
        let prompt = messages
            .iter()
            .filter_map(|m| m.content.as_ref().map(|c| format!("{:?}: {}", m.role, c)))
            .collect::<Vec<_>>()
            .join("\n");
        let text = self.complete(&prompt, config).await?;
        Ok(ChatResponse::Content(text))
    }
}

/// A chat message with role, content, and optional tool call metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }


    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: None,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            role: ChatRole::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call emitted by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// JSON arguments string.
    pub arguments: String,
}

/// Schema describing a tool the model can call (OpenAI-compatible format).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: JsonValue,
}

/// The result of a chat turn, either final text or tool call requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChatResponse {
    Content(String),
    ToolCalls(Vec<ToolCall>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_config_has_zero_temperature() {
        let config = GenerationConfig::deterministic(512);
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.max_tokens, 512);
    }

    #[test]
    fn tool_result_message_carries_call_id() {
        let msg = ChatMessage::tool_result("call_1", "vector_search", "{}");
        assert_eq!(msg.role, ChatRole::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msg.name.as_deref(), Some("vector_search"));
    }
}
