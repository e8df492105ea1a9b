//! External API model backends.
//!
//! Supports OpenAI-compatible chat-completions endpoints and the Google
//! generateContent API.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use super::{ChatMessage, ChatResponse, ChatRole, GenerationConfig, LlmProvider, ToolCall, ToolSchema};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ApiProvider {
    OpenAI,
    Google,
    Ollama,
    Custom { endpoint: String },
}

pub struct ExternalProvider {
    provider: ApiProvider,
    api_key: String,
    model: String,
    client: Client,
}

impl ExternalProvider {
    /// Build a provider with the request timeout taken from
    /// `network.llm_timeout_secs`.
    pub fn from_config(
        provider: ApiProvider,
        api_key: String,
        model: String,
        config: &crate::config::RagConfig,
    ) -> Result<Self> {
        Self::new(provider, api_key, model, config.network.llm_timeout())
    }

    pub fn new(
        provider: ApiProvider,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(timeout)
            .tcp_nodelay(true)
            .build()?;

        Ok(Self {
            provider,
            api_key,
            model,
            client,
        })
    }

    fn endpoint(&self) -> String {
        match &self.provider {
            ApiProvider::OpenAI => "https://api.openai.com/v1/chat/completions".to_string(),
            ApiProvider::Google => format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
                self.model
            ),
            ApiProvider::Ollama => "http://localhost:11434/v1/chat/completions".to_string(),
            ApiProvider::Custom { endpoint } => endpoint.clone(),
        }
    }

    fn map_send_error(endpoint: &str, e: reqwest::Error) -> anyhow::Error {
        if e.is_timeout() {
            anyhow!("request to {} timed out", endpoint)
        } else if e.is_connect() {
            anyhow!("failed to connect to {}: {}", endpoint, e)
        } else {
            anyhow!("request to {} failed: {}", endpoint, e)
        }
    }

    /// Parse a response body as JSON, with a clear error if the server
    /// returned an HTML error page instead.
    async fn parse_json_response(response: reqwest::Response, endpoint: &str) -> Result<serde_json::Value> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| anyhow!("failed to read response body from {}: {}", endpoint, e))?;

        let trimmed = body.trim_start();
        if trimmed.starts_with('<') {
            let preview: String = trimmed.chars().take(200).collect();
            return Err(anyhow!(
                "{} returned HTML instead of JSON (HTTP {}): {}",
                endpoint,
                status,
                preview
            ));
        }
        if !status.is_success() {
            let preview: String = body.chars().take(300).collect();
            return Err(anyhow!("{} returned HTTP {}: {}", endpoint, status, preview));
        }

        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(300).collect();
            anyhow!("bad JSON from {}: {}. Body: {}", endpoint, e, preview)
        })
    }

    async fn openai_compatible_chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
        config: &GenerationConfig,
    ) -> Result<ChatResponse> {
        let endpoint = self.endpoint();

        let wire_messages: Vec<serde_json::Value> = messages
            .iter()
            .map(|m| {
                let mut obj = json!({
                    "role": match m.role {
                        ChatRole::System => "system",
                        ChatRole::User => "user",
                        ChatRole::Assistant => "assistant",
                        ChatRole::Tool => "tool",
                    },
                    "content": m.content,
                });
                if let Some(calls) = &m.tool_calls {
                    obj["tool_calls"] = calls
                        .iter()
                        .map(|c| {
                            json!({
                                "id": c.id,
                                "type": "function",
                                "function": {"name": c.name, "arguments": c.arguments},
                            })
                        })
                        .collect();
                }
                if let Some(id) = &m.tool_call_id {
                    obj["tool_call_id"] = json!(id);
                }
                if let Some(name) = &m.name {
                    obj["name"] = json!(name);
                }
                obj
            })
            .collect();

        let mut request = json!({
            "model": self.model,
            "messages": wire_messages,
            "max_tokens": config.max_tokens,
            "temperature": config.temperature,
            "top_p": config.top_p,
            "stream": false,
        });
        if !tools.is_empty() {
            request["tools"] = tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        },
                    })
                })
                .collect();
        }
        if !config.stop_sequences.is_empty() {
            request["stop"] = json!(config.stop_sequences);
        }

        let response = self
            .client
            .post(&endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| Self::map_send_error(&endpoint, e))?;

        let parsed = Self::parse_json_response(response, &endpoint).await?;
        let message = &parsed["choices"][0]["message"];

        if let Some(calls) = message["tool_calls"].as_array() {
            let tool_calls: Vec<ToolCall> = calls
                .iter()
                .filter_map(|c| {
                    Some(ToolCall {
                        id: c["id"].as_str()?.to_string(),
                        name: c["function"]["name"].as_str()?.to_string(),
                        arguments: c["function"]["arguments"].as_str().unwrap_or("{}").to_string(),
                    })
                })
                .collect();
            if !tool_calls.is_empty() {
                return Ok(ChatResponse::ToolCalls(tool_calls));
            }
        }

        let content = message["content"].as_str().unwrap_or("").to_string();
        Ok(ChatResponse::Content(content))
    }

    async fn google_complete(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        let endpoint = format!("{}?key={}", self.endpoint(), self.api_key);
        let request = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {
                "maxOutputTokens": config.max_tokens,
                "temperature": config.temperature,
                "topP": config.top_p,
            },
        });

        let response = self
            .client
            .post(&endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| Self::map_send_error("generateContent", e))?;

        let parsed = Self::parse_json_response(response, "generateContent").await?;
        parsed["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("generateContent response had no text candidate"))
    }
}

#[async_trait]
impl LlmProvider for ExternalProvider {
    async fn complete(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        match &self.provider {
            ApiProvider::Google => self.google_complete(prompt, config).await,
            _ => {
                let messages = [ChatMessage::user(prompt)];
                match self.openai_compatible_chat(&messages, &[], config).await? {
                    ChatResponse::Content(text) => Ok(text),
                    ChatResponse::ToolCalls(_) => {
                        Err(anyhow!("model returned tool calls for a plain completion"))
                    }
                }
            }
        }
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
        config: &GenerationConfig,
    ) -> Result<ChatResponse> {
        match &self.provider {
            ApiProvider::Google => {
                // generateContent has no OpenAI-style tool wire format here;
                // flatten to a completion.
                let prompt = messages
                    .iter()
                    .filter_map(|m| m.content.clone())
                    .collect::<Vec<_>>()
                    .join("\n");
                Ok(ChatResponse::Content(self.google_complete(&prompt, config).await?))
            }
            _ => self.openai_compatible_chat(messages, tools, config).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RagConfig;

    #[test]
    fn from_config_builds_a_client_with_the_configured_timeout() {
        let provider = ExternalProvider::from_config(
            ApiProvider::Ollama,
            String::new(),
            "llama3".to_string(),
            &RagConfig::default(),
        );
        assert!(provider.is_ok());
    }

    #[test]
    fn custom_provider_uses_its_own_endpoint() {
        let provider = ExternalProvider::new(
            ApiProvider::Custom {
                endpoint: "http://localhost:9000/v1/chat".to_string(),
            },
            String::new(),
            "m".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(provider.endpoint(), "http://localhost:9000/v1/chat");
    }
}
